/// Returns early with `$error` when `$predicate` doesn't hold.
///
/// ```ignore
/// ensure!(self.headers.len() < max_headers, ParseError::too_many_headers(max_headers));
/// ```
macro_rules! ensure {
    ($predicate:expr, $error:expr) => {
        if !$predicate {
            return Err($error);
        }
    };
}

pub(crate) use ensure;
