//! NIK and name extraction from raw OCR text.
//!
//! OCR output for identity cards is noisy: digits get split by stray spaces,
//! labels get misread, and whole regions can come back fragmented. The number
//! is located with a fixed sequence of matchers, highest precision first; the
//! first matcher that yields a 16-digit value decides the result.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

pub const NIK_LENGTH: usize = 16;

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// `NIK` label, optional separators, then digit groups split by single spaces or dashes.
static LABELED_NIK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bNIK[\s:.\-]*((?:[0-9]{1,3}[ \-]?)+)").unwrap());

/// Maximal digit runs with at least 15 digits, allowing single space/dash separators.
static DIGIT_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"[0-9](?:[ \-]?[0-9]){14,}").unwrap());

static NAME_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?im)\bNama\b[ \t]*:?[ \t]*(.*)$").unwrap());

/// Field labels that follow the name on a KTP and must not bleed into it.
static NEXT_FIELD_LABEL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:(?:tempat|tgl|jenis|gol\s+darah|alamat|agama|nik)\b|gol\.)").unwrap()
});

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub identity_number: Option<String>,
    pub full_name: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchStrategy {
    Labeled,
    DigitRun,
    Token,
}

impl MatchStrategy {
    /// Priority order; lower entries only run when earlier ones find nothing.
    pub const ORDERED: [MatchStrategy; 3] = [
        MatchStrategy::Labeled,
        MatchStrategy::DigitRun,
        MatchStrategy::Token,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MatchStrategy::Labeled => "labeled",
            MatchStrategy::DigitRun => "digit_run",
            MatchStrategy::Token => "token",
        }
    }

    /// Runs this matcher over already-normalized text.
    pub fn apply(self, normalized: &str) -> Option<String> {
        match self {
            MatchStrategy::Labeled => match_labeled(normalized),
            MatchStrategy::DigitRun => match_digit_run(normalized),
            MatchStrategy::Token => match_token(normalized),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityMatch {
    pub number: String,
    pub strategy: MatchStrategy,
}

/// Collapses line breaks and whitespace runs into single spaces and trims.
pub fn normalize_text(text: &str) -> String {
    WHITESPACE.replace_all(text, " ").trim().to_string()
}

pub fn extract(text: &str) -> ExtractionResult {
    ExtractionResult {
        identity_number: extract_identity_number(text),
        full_name: extract_full_name(text),
    }
}

pub fn extract_identity_number(text: &str) -> Option<String> {
    find_identity_number(text).map(|found| found.number)
}

pub fn find_identity_number(text: &str) -> Option<IdentityMatch> {
    let normalized = normalize_text(text);

    for strategy in MatchStrategy::ORDERED {
        if let Some(number) = strategy.apply(&normalized) {
            debug!(strategy = strategy.as_str(), "Identity number matched");
            return Some(IdentityMatch { number, strategy });
        }
    }

    debug!(text_length = normalized.len(), "No identity number candidate found");
    None
}

pub fn is_valid_identity_number(value: &str) -> bool {
    value.len() == NIK_LENGTH && value.bytes().all(|b| b.is_ascii_digit())
}

fn digits_only(value: &str) -> String {
    value.chars().filter(|c| c.is_ascii_digit()).collect()
}

fn match_labeled(normalized: &str) -> Option<String> {
    LABELED_NIK
        .captures_iter(normalized)
        .filter_map(|caps| caps.get(1))
        .map(|run| digits_only(run.as_str()))
        .find(|digits| digits.len() == NIK_LENGTH)
}

fn match_digit_run(normalized: &str) -> Option<String> {
    for run in DIGIT_RUN.find_iter(normalized) {
        let digits = digits_only(run.as_str());

        if digits.len() == NIK_LENGTH {
            return Some(digits);
        }

        // Over-long runs usually mean a neighbouring number was glued on.
        if digits.len() > NIK_LENGTH {
            let head = &digits[..NIK_LENGTH];
            if is_valid_identity_number(head) {
                return Some(head.to_string());
            }
        }
    }
    None
}

fn match_token(normalized: &str) -> Option<String> {
    normalized
        .split(|c: char| c.is_whitespace() || c == '-')
        .filter(|token| !token.is_empty())
        .map(digits_only)
        .find(|digits| digits.len() == NIK_LENGTH)
}

/// Best-effort holder name: the rest of the `Nama` line, cut before the next field label.
pub fn extract_full_name(text: &str) -> Option<String> {
    NAME_LINE.captures_iter(text).find_map(|caps| {
        let line = caps.get(1)?.as_str();
        let cut = NEXT_FIELD_LABEL
            .find(line)
            .map(|label| &line[..label.start()])
            .unwrap_or(line);

        let name = normalize_text(cut.trim_matches(|c: char| c == ':' || c == '-' || c.is_whitespace()));
        if name.chars().any(|c| c.is_alphabetic()) {
            Some(name)
        } else {
            None
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_KTP: &str = "PROVINSI JAWA BARAT\nKABUPATEN BEKASI\nNIK : 3201014503900021\n\
        Nama : SITI AMINAH\nTempat/Tgl Lahir : BEKASI, 05-03-1990\nJenis Kelamin : PEREMPUAN\n\
        Alamat : JL. MERDEKA NO. 10";

    #[test]
    fn normalizes_line_breaks_and_runs() {
        assert_eq!(normalize_text("  NIK :\r\n 3201 \t 0145\n\n"), "NIK : 3201 0145");
    }

    #[test]
    fn labeled_match_with_grouped_digits() {
        let found = find_identity_number("... NIK: 3201 0145 0390 0021 ...").unwrap();
        assert_eq!(found.number, "3201014503900021");
        assert_eq!(found.strategy, MatchStrategy::Labeled);
    }

    #[test]
    fn labeled_match_is_case_insensitive_with_dashes() {
        let found = find_identity_number("nik.- 3201-0145-0390-0021").unwrap();
        assert_eq!(found.number, "3201014503900021");
        assert_eq!(found.strategy, MatchStrategy::Labeled);
    }

    #[test]
    fn labeled_match_wins_over_earlier_unlabeled_number() {
        let text = "No. Reg 9999888877776666\nNIK : 3201014503900021";
        let found = find_identity_number(text).unwrap();
        assert_eq!(found.number, "3201014503900021");
        assert_eq!(found.strategy, MatchStrategy::Labeled);
    }

    #[test]
    fn digit_run_used_when_label_misread() {
        let found = find_identity_number("N1K : 3201014503900021\nNama : BUDI").unwrap();
        assert_eq!(found.number, "3201014503900021");
        assert_eq!(found.strategy, MatchStrategy::DigitRun);
    }

    #[test]
    fn digit_run_of_seventeen_takes_first_sixteen() {
        let found = find_identity_number("nomor 32010145039000219 lainnya").unwrap();
        assert_eq!(found.number, "3201014503900021");
        assert_eq!(found.strategy, MatchStrategy::DigitRun);
    }

    #[test]
    fn digit_run_skips_fifteen_digit_candidates() {
        let text = "ref 320101450390002 dan 3175092803870011";
        let found = find_identity_number(text).unwrap();
        assert_eq!(found.number, "3175092803870011");
        assert_eq!(found.strategy, MatchStrategy::DigitRun);
    }

    #[test]
    fn token_scan_handles_letter_noise_inside_token() {
        // Letters split the run below 15 contiguous digits, so only the token pass sees it.
        let found = find_identity_number("ID:3201014a503900021x").unwrap();
        assert_eq!(found.number, "3201014503900021");
        assert_eq!(found.strategy, MatchStrategy::Token);
    }

    #[test]
    fn short_numbers_are_never_padded() {
        assert_eq!(extract_identity_number("NIK : 3201 0145 0390 002"), None);
        assert_eq!(extract_identity_number("RT/RW 001/002 KODE POS 17530"), None);
        assert_eq!(extract_identity_number(""), None);
    }

    #[test]
    fn extraction_is_idempotent() {
        let first = extract(SAMPLE_KTP);
        let second = extract(SAMPLE_KTP);
        assert_eq!(first, second);

        let normalized = normalize_text(SAMPLE_KTP);
        assert_eq!(extract_identity_number(&normalized), first.identity_number);
    }

    #[test]
    fn name_is_truncated_before_next_field() {
        assert_eq!(
            extract_full_name("Nama : John Doe\nTempat Lahir: Jakarta"),
            Some("John Doe".to_string())
        );
        assert_eq!(
            extract_full_name("NAMA: JOHN DOE Tempat/Tgl Lahir JAKARTA"),
            Some("JOHN DOE".to_string())
        );
        assert_eq!(
            extract_full_name("Nama  RINA   WATI Jenis Kelamin"),
            Some("RINA WATI".to_string())
        );
    }

    #[test]
    fn name_stops_at_nik_on_same_line() {
        assert_eq!(
            extract_full_name("Nama : BUDI SANTOSO NIK : 3201014503900021"),
            Some("BUDI SANTOSO".to_string())
        );
    }

    #[test]
    fn name_starting_with_label_prefix_is_kept() {
        assert_eq!(
            extract_full_name("Nama : JENISA PUTRI\nTempat Lahir: Bogor"),
            Some("JENISA PUTRI".to_string())
        );
        assert_eq!(
            extract_full_name("Nama : ALAMATIA NIKITA Gol. Darah O"),
            Some("ALAMATIA NIKITA".to_string())
        );
    }

    #[test]
    fn name_absent_without_label() {
        assert_eq!(extract_full_name("NIK : 3201014503900021"), None);
        assert_eq!(extract_full_name("Nama :\nTempat Lahir"), None);
    }

    #[test]
    fn full_card_extraction() {
        let result = extract(SAMPLE_KTP);
        assert_eq!(result.identity_number.as_deref(), Some("3201014503900021"));
        assert_eq!(result.full_name.as_deref(), Some("SITI AMINAH"));
    }

    #[test]
    fn every_match_is_sixteen_ascii_digits() {
        let samples = [
            SAMPLE_KTP,
            "NIK 3201-0145-0390-0021-77",
            "1234 5678 9012 3456 7890",
            "x3201014503900021y",
            "١٢٣٤٥٦٧٨٩٠١٢٣٤٥٦",
        ];
        for sample in samples {
            if let Some(number) = extract_identity_number(sample) {
                assert!(is_valid_identity_number(&number), "invalid match {number} for {sample}");
            }
        }
    }
}
