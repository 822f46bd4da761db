/// Built-in adverse-media keyword list. Order matters: matched keywords are
/// reported in this order.
pub const DEFAULT_FILTERS: &[&str] = &[
    "corruption",
    "bribery",
    "embezzlement",
    "fraud",
    "money laundering",
    "laundering funds",
    "kickback",
    "graft",
    "misappropriation",
    "extortion",
    "embezzled funds",
    "embezzlement conviction",
    "abuse of office",
    "abuse of power",
    "nepotism",
    "favoritism",
    "public procurement scandal",
    "procurement fraud",
    "conflict of interest",
    "illicit enrichment",
    "unexplained wealth",
    "asset seizure",
    "asset forfeiture",
    "offshore account",
    "shell company",
    "nominee director",
    "nominee shareholder",
    "bearer shares",
    "trust structure",
    "secret bank account",
    "suspicious transaction",
    "structuring",
    "smurfing",
    "large cash deposit",
    "sudden transfer",
    "unexplained transfer",
    "transaction with Panama",
    "transaction with Cayman Islands",
    "sanctions evasion",
    "sanctioned",
    "OFAC",
    "EU sanctions",
    "UN sanctions",
    "blacklist",
    "terrorism financing",
    "sanctions breach",
    "tax evasion",
    "tax fraud",
    "tax shelter",
    "tax haven",
    "offshore leak",
    "Panama Papers",
    "Paradise Papers",
    "Pandora Papers",
    "beneficial owner concealment",
    "indictment",
    "arrested",
    "charged with",
    "convicted",
    "trial",
    "investigation",
    "probe",
    "probe launched",
    "plea bargain",
    "plea deal",
    "sentence",
    "imprisonment",
    "scandal",
    "controversy",
    "resignation amid",
    "accused of",
    "implicated in",
    "alleged bribery",
    "alleged corruption",
    "linked to criminal network",
    "family member charged",
    "spouse charged",
    "close associate arrested",
    "cronyism",
    "relative implicated",
    "business partner arrested",
    "money mule",
    "hawala",
    "trade-based money laundering",
    "false invoicing",
    "shell bank",
    "nominee account",
    "front company",
    "crypto mixer",
    "crypto tumbler",
    "leak",
    "whistleblower",
    "internal memo",
    "forensic audit",
    "investigative report",
    "offshore jurisdiction",
    "tax haven",
    "secrecy jurisdiction",
    "Panama",
    "British Virgin Islands",
    "Cayman Islands",
    "Jersey",
    "Guernsey",
    "Luxembourg",
    "Switzerland",
];

pub fn default_filters() -> Vec<String> {
    DEFAULT_FILTERS.iter().map(|s| s.to_string()).collect()
}

/// Trims every entry and drops the blank ones, keeping order.
pub fn normalize_filters<I, S>(filters: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    filters
        .into_iter()
        .map(|f| f.as_ref().trim().to_string())
        .filter(|f| !f.is_empty())
        .collect()
}
