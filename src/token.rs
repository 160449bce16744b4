//! Delimited token scanning shared by `${...}` and `#{...}` handling.

/// Replace every `open ... close` token in `text` with the handler's output.
///
/// A backslash directly before `open` escapes it: the backslash is dropped
/// and the delimiter is copied verbatim. Inside a token, a backslash before
/// `close` keeps the delimiter as part of the expression. A token with no
/// closing delimiter is copied through unchanged.
pub(crate) fn replace_tokens<E>(
    text: &str,
    open: &str,
    close: &str,
    mut handler: impl FnMut(&str) -> Result<String, E>,
) -> Result<String, E> {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(start) = rest.find(open) {
        if rest[..start].ends_with('\\') {
            out.push_str(&rest[..start - 1]);
            out.push_str(open);
            rest = &rest[start + open.len()..];
            continue;
        }

        out.push_str(&rest[..start]);
        let body = &rest[start + open.len()..];

        let mut expression = String::new();
        let mut cursor = body;
        let mut end = None;
        while let Some(pos) = cursor.find(close) {
            if cursor[..pos].ends_with('\\') {
                expression.push_str(&cursor[..pos - 1]);
                expression.push_str(close);
                cursor = &cursor[pos + close.len()..];
                continue;
            }
            expression.push_str(&cursor[..pos]);
            end = Some(&cursor[pos + close.len()..]);
            break;
        }

        match end {
            Some(remaining) => {
                out.push_str(&handler(&expression)?);
                rest = remaining;
            }
            None => {
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }

    out.push_str(rest);
    Ok(out)
}
