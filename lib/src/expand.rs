use std::collections::BTreeSet;

use crate::domain::Domain;

/// Expands base domains into the full set of names to probe: every base
/// domain itself, plus one name per subdomain prefix.
pub fn expand<'a, P>(bases: impl IntoIterator<Item = &'a Domain>, prefixes: &[P]) -> BTreeSet<Domain>
where
    P: AsRef<str>,
{
    let mut domains = BTreeSet::new();
    for base in bases {
        domains.insert(base.clone());
        for prefix in prefixes {
            domains.insert(base.with_prefix(prefix.as_ref()));
        }
    }
    domains
}
