//! # Language Code Table
//!
//! Maps the language names shown to users ("English", "Chinese (Simplified)") to the
//! `language_Script` tags the translation model expects (`eng_Latn`, `zho_Hans`).
//!
//! The table is static data. It is indexed once, on first use, and never mutated.
//! Lookups are exact: the names must match what the client displays, character for
//! character.

use serde::Serialize;
use std::collections::HashMap;
use std::sync::OnceLock;

/// Every language the translation model supports, keyed by its display name.
static LANGUAGES: &[(&str, &str)] = &[
    ("Acehnese (Arabic)", "ace_Arab"),
    ("Acehnese (Latin)", "ace_Latn"),
    ("Arabic (Mesopotamian)", "acm_Arab"),
    ("Arabic (Ta'izzi-Adeni)", "acq_Arab"),
    ("Arabic (Tunisian)", "aeb_Arab"),
    ("Afrikaans", "afr_Latn"),
    ("Arabic (South Levantine)", "ajp_Arab"),
    ("Akan", "aka_Latn"),
    ("Amharic", "amh_Ethi"),
    ("Arabic (North Levantine)", "apc_Arab"),
    ("Arabic (Standard)", "arb_Arab"),
    ("Arabic (Najdi)", "ars_Arab"),
    ("Arabic (Moroccan)", "ary_Arab"),
    ("Arabic (Egyptian)", "arz_Arab"),
    ("Assamese", "asm_Beng"),
    ("Asturian", "ast_Latn"),
    ("Awadhi", "awa_Deva"),
    ("Aymara", "ayr_Latn"),
    ("Azerbaijani (South)", "azb_Arab"),
    ("Azerbaijani (North)", "azj_Latn"),
    ("Bashkir", "bak_Cyrl"),
    ("Bambara", "bam_Latn"),
    ("Balinese", "ban_Latn"),
    ("Belarusian", "bel_Cyrl"),
    ("Bemba", "bem_Latn"),
    ("Bengali", "ben_Beng"),
    ("Bhojpuri", "bho_Deva"),
    ("Banjar (Arabic)", "bjn_Arab"),
    ("Banjar (Latin)", "bjn_Latn"),
    ("Tibetan", "bod_Tibt"),
    ("Bosnian", "bos_Latn"),
    ("Buginese", "bug_Latn"),
    ("Bulgarian", "bul_Cyrl"),
    ("Catalan", "cat_Latn"),
    ("Cebuano", "ceb_Latn"),
    ("Czech", "ces_Latn"),
    ("Chokwe", "cjk_Latn"),
    ("Kurdish (Central)", "ckb_Arab"),
    ("Crimean Tatar", "crh_Latn"),
    ("Welsh", "cym_Latn"),
    ("Danish", "dan_Latn"),
    ("German", "deu_Latn"),
    ("Dinka", "dik_Latn"),
    ("Dyula", "dyu_Latn"),
    ("Dzongkha", "dzo_Tibt"),
    ("Greek", "ell_Grek"),
    ("English", "eng_Latn"),
    ("Esperanto", "epo_Latn"),
    ("Estonian", "est_Latn"),
    ("Basque", "eus_Latn"),
    ("Ewe", "ewe_Latn"),
    ("Faroese", "fao_Latn"),
    ("Persian", "pes_Arab"),
    ("Fijian", "fij_Latn"),
    ("Finnish", "fin_Latn"),
    ("Fon", "fon_Latn"),
    ("French", "fra_Latn"),
    ("Friulian", "fur_Latn"),
    ("Nigerian Fulfulde", "fuv_Latn"),
    ("Scottish Gaelic", "gla_Latn"),
    ("Irish", "gle_Latn"),
    ("Galician", "glg_Latn"),
    ("Guarani", "grn_Latn"),
    ("Gujarati", "guj_Gujr"),
    ("Haitian Creole", "hat_Latn"),
    ("Hausa", "hau_Latn"),
    ("Hebrew", "heb_Hebr"),
    ("Hindi", "hin_Deva"),
    ("Chhattisgarhi", "hne_Deva"),
    ("Croatian", "hrv_Latn"),
    ("Hungarian", "hun_Latn"),
    ("Armenian", "hye_Armn"),
    ("Igbo", "ibo_Latn"),
    ("Ilocano", "ilo_Latn"),
    ("Indonesian", "ind_Latn"),
    ("Icelandic", "isl_Latn"),
    ("Italian", "ita_Latn"),
    ("Javanese", "jav_Latn"),
    ("Japanese", "jpn_Jpan"),
    ("Kabyle", "kab_Latn"),
    ("Jingpho", "kac_Latn"),
    ("Kamba", "kam_Latn"),
    ("Kannada", "kan_Knda"),
    ("Kashmiri (Arabic)", "kas_Arab"),
    ("Kashmiri (Devanagari)", "kas_Deva"),
    ("Georgian", "kat_Geor"),
    ("Kanuri (Arabic)", "knc_Arab"),
    ("Kanuri (Latin)", "knc_Latn"),
    ("Kazakh", "kaz_Cyrl"),
    ("Kabiyè", "kbp_Latn"),
    ("Kabuverdianu", "kea_Latn"),
    ("Khmer", "khm_Khmr"),
    ("Kikuyu", "kik_Latn"),
    ("Kinyarwanda", "kin_Latn"),
    ("Kyrgyz", "kir_Cyrl"),
    ("Kimbundu", "kmb_Latn"),
    ("Kongo", "kon_Latn"),
    ("Korean", "kor_Hang"),
    ("Kurdish (Northern)", "kmr_Latn"),
    ("Lao", "lao_Laoo"),
    ("Latvian", "lvs_Latn"),
    ("Ligurian", "lij_Latn"),
    ("Limburgish", "lim_Latn"),
    ("Lingala", "lin_Latn"),
    ("Lithuanian", "lit_Latn"),
    ("Lombard", "lmo_Latn"),
    ("Latgalian", "ltg_Latn"),
    ("Luxembourgish", "ltz_Latn"),
    ("Luba-Kasai", "lua_Latn"),
    ("Ganda", "lug_Latn"),
    ("Luo", "luo_Latn"),
    ("Mizo", "lus_Latn"),
    ("Magahi", "mag_Deva"),
    ("Maithili", "mai_Deva"),
    ("Malayalam", "mal_Mlym"),
    ("Marathi", "mar_Deva"),
    ("Minangkabau", "min_Latn"),
    ("Macedonian", "mkd_Cyrl"),
    ("Plateau Malagasy", "plt_Latn"),
    ("Maltese", "mlt_Latn"),
    ("Manipuri", "mni_Beng"),
    ("Mongolian", "khk_Cyrl"),
    ("Mossi", "mos_Latn"),
    ("Māori", "mri_Latn"),
    ("Malay", "zsm_Latn"),
    ("Burmese", "mya_Mymr"),
    ("Dutch", "nld_Latn"),
    ("Norwegian Nynorsk", "nno_Latn"),
    ("Norwegian Bokmål", "nob_Latn"),
    ("Nepali", "npi_Deva"),
    ("Northern Sotho", "nso_Latn"),
    ("Nuer", "nus_Latn"),
    ("Nyanja", "nya_Latn"),
    ("Occitan", "oci_Latn"),
    ("West Central Oromo", "gaz_Latn"),
    ("Odia", "ory_Orya"),
    ("Pangasinan", "pag_Latn"),
    ("Punjabi", "pan_Guru"),
    ("Papiamento", "pap_Latn"),
    ("Polish", "pol_Latn"),
    ("Portuguese", "por_Latn"),
    ("Persian (Dari)", "prs_Arab"),
    ("Pashto", "pbt_Arab"),
    ("Quechua", "quy_Latn"),
    ("Romanian", "ron_Latn"),
    ("Rundi", "run_Latn"),
    ("Russian", "rus_Cyrl"),
    ("Sango", "sag_Latn"),
    ("Sanskrit", "san_Deva"),
    ("Santali", "sat_Beng"),
    ("Sicilian", "scn_Latn"),
    ("Shan", "shn_Mymr"),
    ("Sinhala", "sin_Sinh"),
    ("Slovak", "slk_Latn"),
    ("Slovenian", "slv_Latn"),
    ("Samoan", "smo_Latn"),
    ("Shona", "sna_Latn"),
    ("Sindhi", "snd_Arab"),
    ("Somali", "som_Latn"),
    ("Southern Sotho", "sot_Latn"),
    ("Spanish", "spa_Latn"),
    ("Albanian (Tosk)", "als_Latn"),
    ("Sardinian", "srd_Latn"),
    ("Serbian", "srp_Cyrl"),
    ("Swati", "ssw_Latn"),
    ("Sundanese", "sun_Latn"),
    ("Swedish", "swe_Latn"),
    ("Swahili", "swh_Latn"),
    ("Silesian", "szl_Latn"),
    ("Tamil", "tam_Taml"),
    ("Tatar", "tat_Cyrl"),
    ("Telugu", "tel_Telu"),
    ("Tajik", "tgk_Cyrl"),
    ("Tagalog", "tgl_Latn"),
    ("Thai", "tha_Thai"),
    ("Tigrinya", "tir_Ethi"),
    ("Tamasheq (Latin)", "taq_Latn"),
    ("Tamasheq (Tifinagh)", "taq_Tfng"),
    ("Tok Pisin", "tpi_Latn"),
    ("Tswana", "tsn_Latn"),
    ("Tsonga", "tso_Latn"),
    ("Turkmen", "tuk_Latn"),
    ("Tumbuka", "tum_Latn"),
    ("Turkish", "tur_Latn"),
    ("Twi", "twi_Latn"),
    ("Central Atlas Tamazight", "tzm_Tfng"),
    ("Uyghur", "uig_Arab"),
    ("Ukrainian", "ukr_Cyrl"),
    ("Umbundu", "umb_Latn"),
    ("Urdu", "urd_Arab"),
    ("Uzbek (Northern)", "uzn_Latn"),
    ("Venetian", "vec_Latn"),
    ("Vietnamese", "vie_Latn"),
    ("Waray", "war_Latn"),
    ("Wolof", "wol_Latn"),
    ("Xhosa", "xho_Latn"),
    ("Yiddish", "ydd_Hebr"),
    ("Yoruba", "yor_Latn"),
    ("Cantonese", "yue_Hant"),
    ("Chinese (Simplified)", "zho_Hans"),
    ("Chinese (Traditional)", "zho_Hant"),
    ("Zulu", "zul_Latn"),];

/// Legacy display names still sent by older clients. Each resolves to a tag that
/// already appears in [`LANGUAGES`].
static ALIASES: &[(&str, &str)] = &[
    ("Chinese (Mandarin)", "zho_Hans"),
    ("Arabic", "arb_Arab"),
];

static TABLE: OnceLock<LanguageTable> = OnceLock::new();

/// A supplied language name is not in the table.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unsupported language: {0}")]
pub struct UnknownLanguage(pub String);

/// One row of the table as exposed by `GET /api/languages`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LanguageEntry {
    pub name: &'static str,
    pub tag: &'static str,
    /// Legacy spelling kept for compatibility
    pub alias: bool,
}

/// Immutable name → tag index.
#[derive(Debug)]
pub struct LanguageTable {
    by_name: HashMap<&'static str, &'static str>,
}

impl LanguageTable {
    fn build() -> Self {
        let by_name = LANGUAGES
            .iter()
            .chain(ALIASES.iter())
            .map(|&(name, tag)| (name, tag))
            .collect();
        Self { by_name }
    }

    /// The process-wide table, built on first access.
    pub fn global() -> &'static LanguageTable {
        TABLE.get_or_init(Self::build)
    }

    /// Resolve a display name to its model tag.
    pub fn resolve(&self, display_name: &str) -> Result<&'static str, UnknownLanguage> {
        self.by_name
            .get(display_name)
            .copied()
            .ok_or_else(|| UnknownLanguage(display_name.to_string()))
    }

    /// Number of accepted display names, aliases included.
    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    /// All accepted names sorted alphabetically.
    pub fn entries(&self) -> Vec<LanguageEntry> {
        let mut entries: Vec<LanguageEntry> = LANGUAGES
            .iter()
            .map(|&(name, tag)| LanguageEntry { name, tag, alias: false })
            .chain(
                ALIASES
                    .iter()
                    .map(|&(name, tag)| LanguageEntry { name, tag, alias: true }),
            )
            .collect();
        entries.sort_by(|a, b| a.name.cmp(b.name));
        entries
    }
}

/// Shorthand for `LanguageTable::global().resolve(..)`.
pub fn resolve(display_name: &str) -> Result<&'static str, UnknownLanguage> {
    LanguageTable::global().resolve(display_name)
}

/// Whether `tag` has the `xxx_Yyyy` shape: a three-letter lowercase language code,
/// an underscore, and a capitalised four-letter script code.
pub fn is_valid_tag(tag: &str) -> bool {
    let Some((lang, script)) = tag.split_once('_') else {
        return false;
    };
    let mut script_chars = script.chars();
    lang.len() == 3
        && lang.chars().all(|c| c.is_ascii_lowercase())
        && script.len() == 4
        && script_chars.next().is_some_and(|c| c.is_ascii_uppercase())
        && script_chars.all(|c| c.is_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_every_name_resolves_to_a_well_formed_tag() {
        let table = LanguageTable::global();
        for entry in table.entries() {
            let tag = table.resolve(entry.name).unwrap();
            assert_eq!(tag, entry.tag);
            assert!(is_valid_tag(tag), "{} -> {}", entry.name, tag);
        }
    }

    #[test]
    fn test_display_names_are_unique() {
        let mut seen = HashSet::new();
        for (name, _) in LANGUAGES.iter().chain(ALIASES.iter()) {
            assert!(seen.insert(*name), "duplicate display name {name}");
        }
        assert_eq!(LanguageTable::global().len(), seen.len());
    }

    #[test]
    fn test_common_languages() {
        assert_eq!(resolve("English"), Ok("eng_Latn"));
        assert_eq!(resolve("Spanish"), Ok("spa_Latn"));
        assert_eq!(resolve("French"), Ok("fra_Latn"));
        assert_eq!(resolve("Chinese (Traditional)"), Ok("zho_Hant"));
        assert_eq!(resolve("Arabic (Ta'izzi-Adeni)"), Ok("acq_Arab"));
        assert_eq!(resolve("Norwegian Bokmål"), Ok("nob_Latn"));
    }

    #[test]
    fn test_aliases_share_tags() {
        assert_eq!(resolve("Arabic"), resolve("Arabic (Standard)"));
        assert_eq!(resolve("Chinese (Mandarin)"), resolve("Chinese (Simplified)"));
        for (_, tag) in ALIASES {
            assert!(LANGUAGES.iter().any(|(_, t)| t == tag));
        }
    }

    #[test]
    fn test_unknown_names() {
        assert_eq!(resolve("Klingon"), Err(UnknownLanguage("Klingon".to_string())));
        assert!(resolve("english").is_err());
        assert!(resolve("").is_err());
        assert!(resolve("eng_Latn").is_err());
    }

    #[test]
    fn test_tag_shape() {
        assert!(is_valid_tag("eng_Latn"));
        assert!(!is_valid_tag("en_Latn"));
        assert!(!is_valid_tag("eng_latn"));
        assert!(!is_valid_tag("engLatn"));
        assert!(!is_valid_tag("ENG_Latn"));
    }
}
