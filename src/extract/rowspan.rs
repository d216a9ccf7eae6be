use super::flatten::FlatRow;

/// Flattens the body into one value sequence. A row containing a row-span
/// cell absorbs the following row into its last value; the absorbed row is
/// not considered again. Merging is pairwise only.
pub fn reconcile_rows(rows: Vec<FlatRow>) -> Vec<String> {
    let mut values = Vec::<String>::new();
    let mut rows = rows.into_iter();

    while let Some(row) = rows.next() {
        if row.spans_rows
            && let Some(continuation) = rows.next()
        {
            values.extend(merge_continuation(row.values, &continuation.values));
            continue;
        }

        values.extend(row.values);
    }

    values
}

fn merge_continuation(mut first: Vec<String>, continuation: &[String]) -> Vec<String> {
    let tail = first.pop().unwrap_or_default();
    let joined = continuation
        .iter()
        .map(|value| value.trim())
        .filter(|value| !value.is_empty())
        .collect::<Vec<&str>>()
        .join(" ");

    let merged = match (tail.is_empty(), joined.is_empty()) {
        (_, true) => tail,
        (true, false) => joined,
        (false, false) => format!("{tail} {joined}"),
    };

    first.push(merged);
    first
}
