use std::collections::HashSet;

use lazy_static::lazy_static;

lazy_static! {
    /// Metropolitan departements (Corsica split in 2A/2B) and overseas ones.
    pub static ref DEPARTEMENTS: HashSet<String> = {
        let mut set: HashSet<String> = (1..=95)
            .filter(|n| *n != 20)
            .map(|n| format!("{n:02}"))
            .collect();
        set.extend(["2A", "2B"].map(String::from));
        set.extend((971..=976).map(|n| n.to_string()));
        set
    };
}

pub fn is_known_departement(code: &str) -> bool {
    DEPARTEMENTS.contains(code)
}

/// Departement of a postal code.
///
/// Four-digit codes lost their leading zero somewhere upstream and are
/// padded back ("6600" is in "06"). Corsican codes 200xx/201xx map to 2A,
/// 202xx/206xx to 2B; overseas codes (97x) keep three digits.
pub fn departement_from_zipcode(zipcode: &str) -> Option<String> {
    let zipcode = zipcode.trim();
    if zipcode.is_empty() || !zipcode.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }

    let zipcode = match zipcode.len() {
        4 => format!("0{zipcode}"),
        5 => zipcode.to_string(),
        _ => return None,
    };

    let departement = match &zipcode[..2] {
        "20" => match &zipcode[..3] {
            "200" | "201" => "2A".to_string(),
            _ => "2B".to_string(),
        },
        "97" | "98" => zipcode[..3].to_string(),
        prefix => prefix.to_string(),
    };

    Some(departement)
}
