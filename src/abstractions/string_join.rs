use std::iter::once;
use std::fmt::Display;

/**
Interleave an iterator with separators produced by `sep`. (C.f. `Vec::join(…)`)

From: https://stackoverflow.com/a/66951473

    # use inpla::abstractions::join_iter;
    let ports = ["r", "4"].iter().cloned();
    let rendered = join_iter(ports, |_| ",").collect::<String>();
    // "r,4"
 */
pub fn join_iter<T>(mut iter: impl Iterator<Item = T>, sep: impl Fn(&T) -> T)
                    -> impl Iterator<Item = T>
{
  iter
      .next()
      .into_iter()
      .chain(iter.flat_map(move |s| once(sep(&s)).chain(once(s))))
}

/// Join a list of things that can be displayed as string with a given separator.
pub fn join_string<T:Display>(iter: impl Iterator<Item = T>, sep: &str) -> String {
  join_iter(iter.map(|t| t.to_string()), |_| sep.to_string()).collect::<String>()
}
