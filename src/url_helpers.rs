//! Query/fragment manipulation helpers shared by URL construction and
//! redirect parsing.
//!
//! `url::Url::query_pairs_mut` preserves the byte content of any
//! pre-existing query string and only appends; that property is what lets
//! [`append_to_query`] satisfy the "preserve pre-existing query items
//! byte-exactly" testable property.

use std::collections::BTreeMap;

use url::Url;

/// Appends `params` to `url`'s query string, preserving whatever was there
/// (order, duplicates, empty values) untouched.
pub fn append_to_query(url: &mut Url, params: &[(&str, &str)]) {
    let mut pairs = url.query_pairs_mut();
    for (key, value) in params {
        pairs.append_pair(key, value);
    }
}

/// Appends `params` to `url`'s fragment, treating the fragment as a query
/// string. The URL's own query is left untouched.
pub fn append_to_fragment(url: &mut Url, params: &[(&str, &str)]) {
    let existing = url.fragment().unwrap_or("");
    let mut serializer = url::form_urlencoded::Serializer::new(String::new());
    for (key, value) in url::form_urlencoded::parse(existing.as_bytes()) {
        serializer.append_pair(&key, &value);
    }
    for (key, value) in params {
        serializer.append_pair(key, value);
    }
    url.set_fragment(Some(&serializer.finish()));
}

/// Flattens a query string into a flat string map. On duplicate keys, the
/// first occurrence wins; missing values become empty strings.
pub fn parse_query_map(url: &Url) -> BTreeMap<String, String> {
    flatten(url.query().unwrap_or(""))
}

/// Flattens a URL's fragment, treated as a query string, into a flat map.
pub fn parse_fragment_as_query(url: &Url) -> BTreeMap<String, String> {
    flatten(url.fragment().unwrap_or(""))
}

fn flatten(raw: &str) -> BTreeMap<String, String> {
    let mut map = BTreeMap::new();
    for (key, value) in url::form_urlencoded::parse(raw.as_bytes()) {
        map.entry(key.into_owned()).or_insert_with(|| value.into_owned());
    }
    map
}

/// Two URLs "look alike" iff scheme, userinfo, host, port, and path are
/// byte-equal; query and fragment are ignored. Used by the browser agent to
/// recognize a redirect back to the app's own redirect URI.
pub fn redirect_urls_look_alike(a: &Url, b: &Url) -> bool {
    a.scheme() == b.scheme()
        && a.username() == b.username()
        && a.password() == b.password()
        && a.host_str() == b.host_str()
        && a.port_or_known_default() == b.port_or_known_default()
        && a.path() == b.path()
}
