//! Named attribute filters over SIRENE v3 establishment fields.
//!
//! Column names are the exact SIRENE v3 export headers. A missing field reads
//! as the empty string. Active presets are ANDed.

use crate::types::{EstablishmentPoint, Fields};
use serde::Serialize;

const ETAT_ETAB: &str = "Etat administratif de l'établissement";
const ETAT_UL: &str = "Etat administratif de l'unité légale";
const FERMETURE_ETAB: &str = "Date de fermeture de l'établissement";
const FERMETURE_UL: &str = "Date de fermeture de l'unité légale";
const EMPLOYEUR_ETAB: &str = "Caractère employeur de l'établissement";
const SIEGE: &str = "Etablissement siège";
const CAT_JURIDIQUE: &str = "Catégorie juridique de l'unité légale";
const CAT_ENTREPRISE: &str = "Catégorie de l'entreprise";
const TRANCHE_EFF_ETAB: &str = "Tranche de l'effectif de l'établissement";
const SECTION_ETAB: &str = "Section de l'établissement";
const ESS: &str = "Economie sociale et solidaire unité légale";
const MISSION: &str = "Société à mission unité légale";
const IDENTIF_ASSOC: &str = "Identifiant association de l'unité légale";
const DIFFUSION_ETAB: &str = "Statut de diffusion de l'établissement";

const TRANCHE_50_PLUS: [&str; 9] = ["21", "22", "31", "32", "41", "42", "51", "52", "53"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Rule {
    Active,
    Closed,
    Equals(&'static str, &'static str),
    OneOf(&'static str, &'static [&'static str]),
    Company,
    Association,
}

#[derive(Debug, Clone, Serialize)]
pub struct Preset {
    pub id: &'static str,
    pub label: &'static str,
    pub group: &'static str,
    pub description: &'static str,
    #[serde(skip)]
    rule: Rule,
}

impl Preset {
    pub fn matches(&self, fields: &Fields) -> bool {
        let get = |name| fields.get(name).unwrap_or("");
        match self.rule {
            Rule::Active => {
                get(ETAT_ETAB) == "A"
                    && get(ETAT_UL) == "A"
                    && get(FERMETURE_ETAB).is_empty()
                    && get(FERMETURE_UL).is_empty()
            }
            Rule::Closed => get(ETAT_ETAB) == "F" || !get(FERMETURE_ETAB).is_empty(),
            Rule::Equals(column, expected) => get(column) == expected,
            Rule::OneOf(column, allowed) => {
                let value = get(column);
                allowed.iter().any(|a| *a == value)
            }
            Rule::Company => {
                let cj = get(CAT_JURIDIQUE);
                !cj.is_empty() && !cj.starts_with('1')
            }
            Rule::Association => {
                get(CAT_JURIDIQUE).starts_with("92") || !get(IDENTIF_ASSOC).is_empty()
            }
        }
    }
}

const fn preset(
    id: &'static str,
    label: &'static str,
    group: &'static str,
    description: &'static str,
    rule: Rule,
) -> Preset {
    Preset {
        id,
        label,
        group,
        description,
        rule,
    }
}

const fn sector(
    id: &'static str,
    label: &'static str,
    description: &'static str,
    section: &'static str,
) -> Preset {
    preset(id, label, "Sector", description, Rule::Equals(SECTION_ETAB, section))
}

pub static PRESETS: &[Preset] = &[
    preset(
        "active",
        "Active",
        "Status",
        "Open establishment and active parent company, no closure date on either",
        Rule::Active,
    ),
    preset(
        "closed",
        "Closed",
        "Status",
        "Establishment is administratively closed or has a closure date",
        Rule::Closed,
    ),
    preset(
        "hq",
        "HQ only",
        "Status",
        "Only headquarter establishments (siège social)",
        Rule::Equals(SIEGE, "true"),
    ),
    preset(
        "diffusible",
        "Public",
        "Status",
        "Establishment that has opted into public diffusion",
        Rule::Equals(DIFFUSION_ETAB, "O"),
    ),
    preset(
        "company",
        "Company",
        "Legal form",
        "Corporate entity, not an individual entrepreneur (catégorie juridique not 1xxx)",
        Rule::Company,
    ),
    preset(
        "freelance",
        "Freelance",
        "Legal form",
        "Individual entrepreneur (catégorie juridique 1000)",
        Rule::Equals(CAT_JURIDIQUE, "1000"),
    ),
    preset(
        "sas",
        "SAS / SASU",
        "Legal form",
        "Société par Actions Simplifiée (5710) or single-shareholder variant (5720)",
        Rule::OneOf(CAT_JURIDIQUE, &["5710", "5720"]),
    ),
    preset(
        "sarl",
        "SARL / EURL",
        "Legal form",
        "SARL (5499) or single-owner EURL (5498)",
        Rule::OneOf(CAT_JURIDIQUE, &["5499", "5498"]),
    ),
    preset(
        "association",
        "Association",
        "Legal form",
        "Non-profit association (catégorie juridique 92xx) or has an association identifier",
        Rule::Association,
    ),
    preset(
        "employer",
        "Employer",
        "Size",
        "Establishment has declared employees",
        Rule::Equals(EMPLOYEUR_ETAB, "O"),
    ),
    preset(
        "pme",
        "PME",
        "Size",
        "Small / Medium enterprise (catégorie INSEE = PME)",
        Rule::Equals(CAT_ENTREPRISE, "PME"),
    ),
    preset(
        "eti-ge",
        "ETI / GE",
        "Size",
        "Mid-size (ETI) or large enterprise (GE)",
        Rule::OneOf(CAT_ENTREPRISE, &["ETI", "GE"]),
    ),
    preset(
        "50plus",
        "50+ employees",
        "Size",
        "Establishment with 50 or more employees (tranche d'effectif 21 and above)",
        Rule::OneOf(TRANCHE_EFF_ETAB, &TRANCHE_50_PLUS),
    ),
    preset("ess", "ESS", "Values", "Economie Sociale et Solidaire", Rule::Equals(ESS, "O")),
    preset(
        "mission",
        "Société à mission",
        "Values",
        "Company with a declared social or environmental mission",
        Rule::Equals(MISSION, "O"),
    ),
    sector("commerce", "Commerce", "Wholesale and retail trade (NAF section G)", "G"),
    sector("industry", "Industry", "Manufacturing (NAF section C)", "C"),
    sector("construction", "Construction", "Building and civil engineering (NAF section F)", "F"),
    sector("tech", "IT / Tech", "Information and communication (NAF section J)", "J"),
    sector("health", "Health", "Human health and social work (NAF section Q)", "Q"),
    sector("food", "Food & Hotels", "Accommodation and food services (NAF section I)", "I"),
    sector("transport", "Transport", "Transportation and storage (NAF section H)", "H"),
    sector("finance", "Finance", "Financial and insurance activities (NAF section K)", "K"),
    sector("realestate", "Real estate", "Real estate activities (NAF section L)", "L"),
    sector(
        "pro-services",
        "Pro services",
        "Professional, scientific and technical activities (NAF section M)",
        "M",
    ),
    sector("education", "Education", "Education (NAF section P)", "P"),
    sector("agriculture", "Agriculture", "Agriculture, forestry and fishing (NAF section A)", "A"),
];

pub fn find(id: &str) -> Option<&'static Preset> {
    PRESETS.iter().find(|p| p.id == id)
}

/// Resolve preset ids, returning the first unknown id as the error.
pub fn resolve<S: AsRef<str>>(ids: &[S]) -> Result<Vec<&'static Preset>, String> {
    ids.iter()
        .map(|id| find(id.as_ref()).ok_or_else(|| id.as_ref().to_string()))
        .collect()
}

pub fn apply(points: Vec<EstablishmentPoint>, active: &[&Preset]) -> Vec<EstablishmentPoint> {
    if active.is_empty() {
        return points;
    }
    points
        .into_iter()
        .filter(|p| active.iter().all(|preset| preset.matches(&p.fields)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;

    const GROUPS: [&str; 5] = ["Status", "Legal form", "Size", "Values", "Sector"];

    fn establishment(pairs: &[(&str, &str)]) -> EstablishmentPoint {
        let keys: Arc<[String]> = pairs.iter().map(|(k, _)| k.to_string()).collect();
        let values = pairs.iter().map(|(_, v)| v.to_string()).collect();
        EstablishmentPoint {
            latitude: 48.86,
            longitude: 2.35,
            fields: Fields::new(keys, values),
        }
    }

    #[test]
    fn ids_are_unique_and_groups_known() {
        let ids: HashSet<_> = PRESETS.iter().map(|p| p.id).collect();
        assert_eq!(ids.len(), PRESETS.len());
        assert!(PRESETS.iter().all(|p| GROUPS.contains(&p.group)));
    }

    #[test]
    fn active_requires_both_states_and_no_closure() {
        let active = find("active").unwrap();
        let open = establishment(&[
            (ETAT_ETAB, "A"),
            (ETAT_UL, "A"),
            (FERMETURE_ETAB, ""),
            (FERMETURE_UL, ""),
        ]);
        let closed_ul = establishment(&[(ETAT_ETAB, "A"), (ETAT_UL, "C")]);
        let dated = establishment(&[
            (ETAT_ETAB, "A"),
            (ETAT_UL, "A"),
            (FERMETURE_ETAB, "2020-01-01"),
        ]);

        assert!(active.matches(&open.fields));
        assert!(!active.matches(&closed_ul.fields));
        assert!(!active.matches(&dated.fields));
        assert!(find("closed").unwrap().matches(&dated.fields));
    }

    #[test]
    fn legal_form_rules() {
        let sas = establishment(&[(CAT_JURIDIQUE, "5710")]);
        let ei = establishment(&[(CAT_JURIDIQUE, "1000")]);
        let asso = establishment(&[(CAT_JURIDIQUE, "9220")]);
        let unknown = establishment(&[]);

        assert!(find("sas").unwrap().matches(&sas.fields));
        assert!(find("company").unwrap().matches(&sas.fields));
        assert!(!find("company").unwrap().matches(&ei.fields));
        assert!(!find("company").unwrap().matches(&unknown.fields));
        assert!(find("freelance").unwrap().matches(&ei.fields));
        assert!(find("association").unwrap().matches(&asso.fields));
    }

    #[test]
    fn apply_ands_active_presets() {
        let points = vec![
            establishment(&[("SIRET", "1"), (SECTION_ETAB, "J"), (EMPLOYEUR_ETAB, "O")]),
            establishment(&[("SIRET", "2"), (SECTION_ETAB, "J"), (EMPLOYEUR_ETAB, "N")]),
            establishment(&[("SIRET", "3"), (SECTION_ETAB, "G"), (EMPLOYEUR_ETAB, "O")]),
        ];
        let active = resolve(&["tech", "employer"]).unwrap();

        let kept = apply(points, &active);
        let ids: Vec<_> = kept.iter().filter_map(|p| p.siret()).collect();
        assert_eq!(ids, vec!["1"]);
    }

    #[test]
    fn unknown_id_is_reported() {
        assert_eq!(resolve(&["tech", "nope"]).unwrap_err(), "nope");
        assert!(resolve::<&str>(&[]).unwrap().is_empty());
    }
}
