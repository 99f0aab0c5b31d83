use tracing::field::{Field, Visit};
use tracing_subscriber::{
  field::RecordFields,
  fmt::{
    format::Writer,
    FormatFields
  }
};

/// Prints the message and any extra fields, hiding the bookkeeping fields `threshold` and `critical`.
pub(crate) struct CustomFieldFormatter;

impl<'writer> FormatFields<'writer> for CustomFieldFormatter {
  fn format_fields<R: RecordFields>(
    &self,
    writer: Writer<'writer>,
    fields: R,
  ) -> std::fmt::Result {
    let mut visitor = FieldFilterVisitor { writer };
    fields.record(&mut visitor);
    Ok(())
  }
}

struct FieldFilterVisitor<'writer> {
  writer: Writer<'writer>,
}

impl<'writer> Visit for FieldFilterVisitor<'writer> {
  fn record_i64(&mut self, field: &Field, value: i64) {
    if field.name() != "threshold" {
      let _ = write!(self.writer, "{}={} ", field.name(), value);
    }
  }

  fn record_u64(&mut self, field: &Field, value: u64) {
    if field.name() != "threshold" {
      let _ = write!(self.writer, "{}={} ", field.name(), value);
    }
  }

  fn record_bool(&mut self, field: &Field, value: bool) {
    match (field.name(), value) {
      ("critical", true)  => { let _ = write!(self.writer, "[CRITICAL] "); }
      ("critical", false) => {}
      (name, value)       => { let _ = write!(self.writer, "{}={} ", name, value); }
    }
  }

  fn record_str(&mut self, field: &Field, value: &str) {
    match field.name() {
      "message"   => { let _ = write!(self.writer, "{}", value); }
      "threshold" => {}
      name        => { let _ = write!(self.writer, "{}={} ", name, value); }
    }
  }

  fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
    match field.name() {
      // `format_args!` messages arrive here; their `Debug` is their `Display`.
      "message"   => { let _ = write!(self.writer, "{:?}", value); }
      "threshold" => {}
      name        => { let _ = write!(self.writer, "{}={:?} ", name, value); }
    }
  }
}
