use url::{form_urlencoded, Url};

/// One bound lookup key.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct LookupArg {
    pub name: String,
    pub value: String,
}

impl LookupArg {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

impl<N, V> From<(N, V)> for LookupArg
where
    N: Into<String>,
    V: Into<String>,
{
    fn from((name, value): (N, V)) -> Self {
        Self::new(name, value)
    }
}

/// Concrete GET request for one lookup call.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct LookupRequest {
    url: Url,
}

impl LookupRequest {
    pub fn url(&self) -> &Url {
        &self.url
    }
}

/// Builds the lookup request, or `None` when any argument is unavailable.
///
/// Query parameters follow `argument_names` order and are percent-encoded
/// (a space becomes `%20`, not `+`). When `args` holds the same name twice,
/// the first value wins.
pub(crate) fn build_request(
    base_url: &Url,
    argument_names: &[String],
    args: &[LookupArg],
) -> Option<LookupRequest> {
    if args.is_empty() {
        return None;
    }

    let values = argument_names
        .iter()
        .map(|name| {
            args.iter()
                .find(|arg| &arg.name == name)
                .map(|arg| (name.as_str(), arg.value.as_str()))
        })
        .collect::<Option<Vec<_>>>()?;

    let mut url = base_url.clone();
    if !values.is_empty() {
        let encoded = percent_encode_pairs(&values);
        let query = match url.query() {
            Some(existing) if !existing.is_empty() => format!("{existing}&{encoded}"),
            _ => encoded,
        };
        url.set_query(Some(&query));
    }
    Some(LookupRequest { url })
}

// Form encoding escapes a literal `+` as `%2B`, so every remaining `+` is a space.
fn percent_encode_pairs(pairs: &[(&str, &str)]) -> String {
    form_urlencoded::Serializer::new(String::new())
        .extend_pairs(pairs)
        .finish()
        .replace('+', "%20")
}
