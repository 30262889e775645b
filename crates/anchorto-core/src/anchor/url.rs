//! URL state for the section scrolled to

use url::Url;

use crate::config::UrlMode;

/// Query parameter used by [`UrlMode::Query`]
pub const QUERY_KEY: &str = "scrollto";

/// Id written to the URL when the destination has none
pub const FALLBACK_ID: &str = "section";

/// URL to push after scrolling to section `id`, `None` for [`UrlMode::None`]
///
/// Hash mode replaces the fragment. Query mode sets `scrollto=<id>` in place,
/// keeps the other pairs and drops the fragment.
pub fn url_for_section(current: &Url, mode: UrlMode, id: &str) -> Option<Url> {
    let mut url = current.clone();
    match mode {
        UrlMode::None => return None,
        UrlMode::Hash => url.set_fragment(Some(id)),
        UrlMode::Query => {
            let mut replaced = false;
            let mut pairs: Vec<(String, String)> = Vec::new();
            for (key, value) in current.query_pairs() {
                if key == QUERY_KEY {
                    if replaced {
                        continue;
                    }
                    replaced = true;
                    pairs.push((key.into_owned(), id.to_string()));
                } else {
                    pairs.push((key.into_owned(), value.into_owned()));
                }
            }
            if !replaced {
                pairs.push((QUERY_KEY.to_string(), id.to_string()));
            }

            url.query_pairs_mut().clear().extend_pairs(pairs);
            url.set_fragment(None);
        }
    }
    Some(url)
}

/// Section id named by `url`: the `scrollto` parameter in query mode, the
/// fragment otherwise
pub fn section_from_url(url: &Url, mode: UrlMode) -> Option<String> {
    let id = match mode {
        UrlMode::Query => url
            .query_pairs()
            .find(|(key, _)| key == QUERY_KEY)
            .map(|(_, value)| value.into_owned()),
        UrlMode::Hash | UrlMode::None => url.fragment().map(str::to_string),
    };
    id.filter(|id| !id.is_empty())
}
