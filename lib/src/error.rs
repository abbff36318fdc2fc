/// Terminal failures that end a run.
///
/// Individual probe failures never surface here; techniques report those as
/// stream errors which get logged and dropped.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("no IPs resolved for any site")]
    NoResults,

    #[error("unknown blocklist source `{name}` (known: {known})")]
    UnknownSource { name: String, known: String },

    #[error("failed to fetch blocklist from {url}")]
    Fetch {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}
