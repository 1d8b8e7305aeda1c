use crate::models::enums::AliasSource;
use crate::models::Alias;

/// Derive the name variants a person is likely to appear under on forms.
///
/// Pure and deterministic: the same input always yields the same list in the
/// same order. Names with fewer than two parts yield nothing.
pub fn generate_aliases(full_name: &str, preferred_name: Option<&str>) -> Vec<Alias> {
    let parts: Vec<&str> = full_name.split_whitespace().collect();
    if parts.len() < 2 {
        return Vec::new();
    }

    let first = parts[0];
    let last = parts[parts.len() - 1];
    let middles = &parts[1..parts.len() - 1];
    let preferred = preferred_name.map(str::trim).filter(|p| !p.is_empty());

    let mut aliases = vec![
        Alias::new(format!("{first} {last}"), AliasSource::FormTruncation),
        Alias::new(format!("{}. {last}", initial(first)), AliasSource::FormTruncation),
    ];

    if let Some(pref) = preferred {
        if !pref.eq_ignore_ascii_case(first) {
            aliases.push(Alias::new(format!("{pref} {last}"), AliasSource::Preferred).primary());
            aliases.push(Alias::new(
                format!("{}. {pref} {last}", initial(first)),
                AliasSource::Formal,
            ));
        }
    }

    for middle in middles {
        if preferred.is_some_and(|p| p.eq_ignore_ascii_case(middle)) {
            continue;
        }
        aliases.push(Alias::new(
            format!("{first} {}. {last}", initial(middle)),
            AliasSource::FormTruncation,
        ));
        aliases.push(Alias::new(format!("{middle} {last}"), AliasSource::MiddleNameUsed));
    }

    dedup_by_name(aliases)
}

/// Operator-supplied extra names (nicknames, maiden names).
pub fn nickname_aliases(names: &[String]) -> Vec<Alias> {
    let aliases = names
        .iter()
        .map(|n| n.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|n| !n.is_empty())
        .map(|n| Alias::new(n, AliasSource::Nickname))
        .collect();
    dedup_by_name(aliases)
}

fn initial(word: &str) -> String {
    word.chars().next().map(String::from).unwrap_or_default()
}

fn dedup_by_name(aliases: Vec<Alias>) -> Vec<Alias> {
    let mut seen = std::collections::HashSet::new();
    aliases
        .into_iter()
        .filter(|a| seen.insert(a.name.clone()))
        .collect()
}
