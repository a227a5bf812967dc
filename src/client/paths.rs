//! Endpoint path templates and URL construction.
//!
//! Templates are relative to the server base URL and must end with `/`:
//! without it Assemblyline answers with a redirect, and following that redirect
//! drops the session cookie. A template that breaks this rule is rejected
//! before any request is sent.

use url::Url;

use super::error::ClientError;

pub(crate) const LOGIN: &str = "api/v4/auth/login/";
pub(crate) const FILE_DOWNLOAD: &str = "api/v4/file/download/{sha256}/";
pub(crate) const FILE_INFO: &str = "api/v4/file/info/{sha256}/";
pub(crate) const FILE_RESULTS: &str = "api/v4/file/result/{sha256}/";
pub(crate) const FILE_RESULT_FOR_SERVICE: &str = "api/v4/file/result/{sha256}/{service}/";
pub(crate) const HASH_SEARCH: &str = "api/v4/hash_search/{hash}/";
pub(crate) const HASH_SEARCH_DATA_SOURCES: &str = "api/v4/hash_search/list_data_sources/";
pub(crate) const INGEST: &str = "api/v4/ingest/";
pub(crate) const INGEST_MESSAGE_LIST: &str = "api/v4/ingest/get_message_list/{queue}/";
pub(crate) const RESULT: &str = "api/v4/result/{cache_key}/";
pub(crate) const SUBMISSION_IS_COMPLETED: &str = "api/v4/submission/is_completed/{sid}/";
pub(crate) const SUBMISSION: &str = "api/v4/submission/{sid}/";
pub(crate) const SUBMISSION_FILE_RESULTS: &str = "api/v4/submission/{sid}/file/{sha256}/";
pub(crate) const SUBMISSION_FULL: &str = "api/v4/submission/full/{sid}/";
pub(crate) const SUBMISSION_TREE: &str = "api/v4/submission/tree/{sid}/";
pub(crate) const SUBMIT: &str = "api/v4/submit/";

/// Parses a server base URL and makes sure joining a relative path keeps its path.
///
/// # Errors
///
/// Returns [`ClientError::Usage`] for unparsable URLs or non-HTTP schemes.
pub(crate) fn normalize_base_url(raw: &str) -> Result<Url, ClientError> {
    let mut url = Url::parse(raw.trim())
        .map_err(|e| ClientError::usage(format!("invalid base URL '{raw}': {e}")))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ClientError::usage(format!(
            "base URL must use http or https, got '{}'",
            url.scheme()
        )));
    }
    url.set_query(None);
    url.set_fragment(None);
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

/// Expands `template` with `args` (in placeholder order) and appends the query.
///
/// Each argument is percent-encoded as a single path segment. Query pairs with
/// no value are skipped, and no `?` is added when nothing remains.
///
/// # Errors
///
/// Returns [`ClientError::Usage`] when the template does not end with `/`,
/// when the placeholder and argument counts differ, or when an argument is
/// empty or a dot segment (`.` or `..`).
pub(crate) fn build_url(
    base: &Url,
    template: &str,
    args: &[&str],
    query: &[(&str, Option<&str>)],
) -> Result<Url, ClientError> {
    if !template.ends_with('/') {
        return Err(ClientError::usage(format!(
            "request path template does not end with a slash: {template}"
        )));
    }

    let path = expand(template, args)?;
    let mut url = base
        .join(&path)
        .map_err(|e| ClientError::usage(format!("cannot join '{path}' onto {base}: {e}")))?;

    let mut present = query
        .iter()
        .filter_map(|(key, value)| value.map(|value| (*key, value)))
        .peekable();
    if present.peek().is_some() {
        url.query_pairs_mut().extend_pairs(present);
    }
    Ok(url)
}

fn expand(template: &str, args: &[&str]) -> Result<String, ClientError> {
    let mut out = String::with_capacity(template.len() + 64);
    let mut rest = template;
    let mut args = args.iter();

    while let Some(open) = rest.find('{') {
        let close = rest[open..].find('}').map(|offset| open + offset).ok_or_else(|| {
            ClientError::usage(format!("unterminated placeholder in path template: {template}"))
        })?;
        let name = &rest[open + 1..close];
        let value = args.next().ok_or_else(|| {
            ClientError::usage(format!("missing value for '{{{name}}}' in {template}"))
        })?;
        if value.is_empty() {
            return Err(ClientError::usage(format!(
                "value for '{{{name}}}' in {template} must not be empty"
            )));
        }
        if matches!(*value, "." | "..") {
            return Err(ClientError::usage(format!(
                "value for '{{{name}}}' in {template} must not be a dot segment, got '{value}'"
            )));
        }
        out.push_str(&rest[..open]);
        out.push_str(&urlencoding::encode(value));
        rest = &rest[close + 1..];
    }
    out.push_str(rest);

    if args.next().is_some() {
        return Err(ClientError::usage(format!(
            "too many values for path template {template}"
        )));
    }
    Ok(out)
}
