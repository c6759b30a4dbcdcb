//! Path lookup into JSON-shaped records.

use serde_json::Value;

/// Follow `path` from `root`. Object members are addressed by key, array
/// elements by a base-10 index. `None` means the path does not resolve.
pub fn get_path<'a, S: AsRef<str>>(root: &'a Value, path: &[S]) -> Option<&'a Value> {
    path.iter().try_fold(root, |current, segment| {
        let segment = segment.as_ref();
        match current {
            Value::Object(map) => map.get(segment),
            Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        }
    })
}
