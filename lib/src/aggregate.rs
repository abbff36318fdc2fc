use std::collections::BTreeSet;
use std::net::Ipv4Addr;

use crate::Error;

/// Orders resolved addresses for display.
///
/// Sorting is lexicographic on the dotted text form, not numeric, so
/// `10.0.0.1` sorts before `9.9.9.9`.
///
/// # Errors
///
/// - [`Error::NoResults`] if there is nothing to report
pub fn finalize<'a>(ips: impl IntoIterator<Item = &'a Ipv4Addr>) -> Result<Vec<String>, Error> {
    let ips: BTreeSet<String> = ips.into_iter().map(ToString::to_string).collect();
    if ips.is_empty() {
        return Err(Error::NoResults);
    }
    Ok(ips.into_iter().collect())
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(&["9.9.9.9", "10.0.0.1", "1.1.1.1"], &["1.1.1.1", "10.0.0.1", "9.9.9.9"])]
    #[case(&["93.184.216.34"], &["93.184.216.34"])]
    #[case(&["2.2.2.2", "2.2.2.2", "100.1.1.1"], &["100.1.1.1", "2.2.2.2"])]
    fn finalize_sorts_and_dedupes(#[case] input: &[&str], #[case] should: &[&str]) {
        let ips: Vec<Ipv4Addr> = input.iter().map(|x| x.parse().unwrap()).collect();
        let got = finalize(&ips).unwrap();
        assert_eq!(got, should);
    }

    #[test]
    fn finalize_rejects_empty() {
        let got = finalize(&BTreeSet::new());
        assert!(matches!(got, Err(Error::NoResults)));
    }
}
