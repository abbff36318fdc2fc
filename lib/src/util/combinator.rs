use futures::Stream;
use futures::StreamExt;
use futures::TryStreamExt;

/// Inspects and drops the `Err` variant of a [`Result`]-returning stream,
/// yielding only the `Ok` variant.
///
/// Accepts an inspector to, for example, log the error.
pub fn flatten_err<S, T, E, I>(stream: S, inspector: I) -> impl Stream<Item = T>
where
    S: Stream<Item = Result<T, E>>,
    I: FnMut(&E),
{
    stream
        .inspect_err(inspector)
        .map(futures::stream::iter)
        .flatten()
}
