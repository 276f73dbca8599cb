//! Validation of DICOM element values against the core rule catalogue.
//!
//! This module implements a small, composable rule engine: each [`Rule`]
//! inspects an [`ElementContext`] and produces an optional [`Diagnostic`].
//! Rules are grouped into named [`Profile`]s which decide both which rules
//! run and at what [`Severity`] a failure is reported.
//!
//! Rules are pure and re-entrant; the same [`Rule`] value may be shared
//! across threads and called concurrently.

use std::fmt;

use crate::header::{Tag, VR};

/// The severity of a validation [`Diagnostic`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    /// Informational note, does not indicate a standard violation.
    Info,
    /// Deviates from the standard but is commonly tolerated.
    Warning,
    /// Violates the standard.
    Error,
}

/// A stable rule identifier, used to correlate diagnostics across runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum RuleCode {
    /// `(0008,0005)`-independent UID syntax (VR = UI).
    UidFormat,
    /// Date syntax and calendar validity (VR = DA).
    DateFormat,
    /// Time syntax and range validity (VR = TM).
    TimeFormat,
    /// Code string charset and length (VR = CS).
    CodeString,
    /// Age string syntax (VR = AS).
    AgeString,
    /// Decimal string syntax (VR = DS).
    DecimalString,
    /// Integer string syntax (VR = IS).
    IntegerString,
    /// Application entity title syntax (VR = AE).
    ApplicationEntity,
    /// Maximum length for a string VR.
    StringLength,
    /// A private data element has no governing private creator in the dataset.
    OrphanPrivateElement,
}

impl RuleCode {
    /// The stable textual code reported to users, e.g. in log output.
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleCode::UidFormat => "INVALID_UID_FORMAT",
            RuleCode::DateFormat => "INVALID_DATE_VALUE",
            RuleCode::TimeFormat => "INVALID_TIME_VALUE",
            RuleCode::CodeString => "INVALID_CODE_STRING",
            RuleCode::AgeString => "INVALID_AGE_STRING",
            RuleCode::DecimalString => "INVALID_DECIMAL_STRING",
            RuleCode::IntegerString => "INVALID_INTEGER_STRING",
            RuleCode::ApplicationEntity => "INVALID_APPLICATION_ENTITY",
            RuleCode::StringLength => "STRING_TOO_LONG",
            RuleCode::OrphanPrivateElement => "ORPHAN_PRIVATE_ELEMENT",
        }
    }
}

impl fmt::Display for RuleCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One validation finding produced by a [`Rule`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// The rule that produced this diagnostic.
    pub code: RuleCode,
    /// The severity at which this diagnostic should be treated,
    /// as decided by the active [`Profile`].
    pub severity: Severity,
    /// The tag of the offending element.
    pub tag: Tag,
    /// A human-readable explanation.
    pub message: String,
    /// An optional suggested fix (e.g. a corrected value).
    pub suggested_fix: Option<String>,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:?}] {} at {}: {}", self.severity, self.code, self.tag, self.message)
    }
}

/// Everything a [`Rule`] needs to judge a single element.
///
/// Cross-element checks (such as orphan private element detection) receive
/// a callback to query whether a given private creator is present in the
/// same dataset, rather than a full dataset reference, so that this module
/// does not depend on `dicom-core`'s higher-level dataset types.
pub struct ElementContext<'a> {
    /// The element's tag.
    pub tag: Tag,
    /// The element's declared VR.
    pub vr: VR,
    /// The raw value bytes, as found on the wire (before charset decoding
    /// for string VRs other than the default repertoire).
    pub value: &'a [u8],
    /// Whether a private creator is registered for this tag's `(group,
    /// slot)`, when `tag` is a private data tag. `None` for tags where the
    /// question does not apply (public tags, or creator tags themselves).
    pub has_private_creator: Option<bool>,
}

impl<'a> ElementContext<'a> {
    /// Interpret the raw value bytes as trimmed ASCII/Latin text.
    ///
    /// DICOM string VRs are padded with a trailing space (or NUL for UI);
    /// this strips that padding for rule matching.
    pub fn as_str(&self) -> std::borrow::Cow<'a, str> {
        let s = String::from_utf8_lossy(self.value);
        match s {
            std::borrow::Cow::Borrowed(s) => {
                std::borrow::Cow::Borrowed(s.trim_end_matches(['\0', ' ']))
            }
            std::borrow::Cow::Owned(s) => {
                std::borrow::Cow::Owned(s.trim_end_matches(['\0', ' ']).to_string())
            }
        }
    }
}

/// A pure rule: `(element_context) -> diagnostic | none`.
///
/// Implemented as a function pointer so that the core rule catalogue can be
/// built as a `const`/`static` table; user-defined rules may also be
/// supplied as plain closures coerced to `fn` where possible, or via
/// [`Rule::Dynamic`] for closures that capture state.
#[derive(Clone, Copy)]
pub struct Rule {
    code: RuleCode,
    check: fn(&ElementContext<'_>) -> Option<(Severity, String, Option<String>)>,
}

impl fmt::Debug for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rule").field("code", &self.code).finish()
    }
}

impl Rule {
    /// The rule's stable identifier.
    pub fn code(&self) -> RuleCode {
        self.code
    }

    /// Apply this rule to an element, at the given severity ceiling.
    ///
    /// `max_severity` is the severity this rule is allowed to report under
    /// the active profile; `None` means the rule is disabled.
    pub fn check(&self, ctx: &ElementContext<'_>, max_severity: Option<Severity>) -> Option<Diagnostic> {
        let max_severity = max_severity?;
        let (severity, message, suggested_fix) = (self.check)(ctx)?;
        Some(Diagnostic {
            code: self.code,
            severity: severity.min(max_severity),
            tag: ctx.tag,
            message,
            suggested_fix,
        })
    }
}

/// A named bundle of rules plus the severity each one runs at.
///
/// Three standard profiles are provided: [`Profile::strict`],
/// [`Profile::lenient`] and [`Profile::permissive`]. Profile selection is
/// made per validation call; profiles (and the rules inside them) are
/// immutable and safe to share across threads.
#[derive(Debug, Clone)]
pub struct Profile {
    name: &'static str,
    rules: Vec<(Rule, Severity)>,
}

impl Profile {
    /// All core structural and identifier rules run as errors, all
    /// character/format rules run as errors.
    pub fn strict() -> Profile {
        Profile {
            name: "strict",
            rules: core_rules()
                .into_iter()
                .map(|r| (r, Severity::Error))
                .collect(),
        }
    }

    /// Structural and identifier rules (UID format, orphan private
    /// elements, string length) run as errors; character/format rules
    /// (date, time, code string, age string, decimal/integer string,
    /// application entity) run as warnings.
    pub fn lenient() -> Profile {
        let structural = [RuleCode::UidFormat, RuleCode::OrphanPrivateElement, RuleCode::StringLength];
        Profile {
            name: "lenient",
            rules: core_rules()
                .into_iter()
                .map(|r| {
                    let sev = if structural.contains(&r.code()) {
                        Severity::Error
                    } else {
                        Severity::Warning
                    };
                    (r, sev)
                })
                .collect(),
        }
    }

    /// Only structural rules (UID format, orphan private elements) run, as
    /// warnings.
    pub fn permissive() -> Profile {
        let structural = [RuleCode::UidFormat, RuleCode::OrphanPrivateElement];
        Profile {
            name: "permissive",
            rules: core_rules()
                .into_iter()
                .filter(|r| structural.contains(&r.code()))
                .map(|r| (r, Severity::Warning))
                .collect(),
        }
    }

    /// This profile's name (`"strict"`, `"lenient"`, `"permissive"`, or a
    /// user-assigned name for a custom profile).
    pub fn name(&self) -> &str {
        self.name
    }

    /// Build a custom profile from an explicit rule/severity table.
    pub fn custom(name: &'static str, rules: Vec<(Rule, Severity)>) -> Profile {
        Profile { name, rules }
    }

    /// Validate a single element against every rule in this profile,
    /// collecting all diagnostics produced (a profile may have more than
    /// one rule applicable to the same VR, though the core catalogue does
    /// not).
    pub fn validate_element(&self, ctx: &ElementContext<'_>) -> Vec<Diagnostic> {
        self.rules
            .iter()
            .filter_map(|(rule, severity)| rule.check(ctx, Some(*severity)))
            .collect()
    }
}

/// Validate a whole dataset-like sequence of elements, in tag order,
/// against a profile. This is the orthogonal visitor described for the
/// validation engine: it does not mutate or reorder anything, it only
/// produces diagnostics.
pub fn validate_elements<'a, I>(profile: &Profile, elements: I) -> Vec<Diagnostic>
where
    I: IntoIterator<Item = ElementContext<'a>>,
{
    elements
        .into_iter()
        .flat_map(|ctx| profile.validate_element(&ctx))
        .collect()
}

fn core_rules() -> Vec<Rule> {
    vec![
        Rule { code: RuleCode::UidFormat, check: check_uid },
        Rule { code: RuleCode::DateFormat, check: check_date },
        Rule { code: RuleCode::TimeFormat, check: check_time },
        Rule { code: RuleCode::CodeString, check: check_code_string },
        Rule { code: RuleCode::AgeString, check: check_age_string },
        Rule { code: RuleCode::DecimalString, check: check_decimal_string },
        Rule { code: RuleCode::IntegerString, check: check_integer_string },
        Rule { code: RuleCode::ApplicationEntity, check: check_application_entity },
        Rule { code: RuleCode::StringLength, check: check_string_length },
        Rule { code: RuleCode::OrphanPrivateElement, check: check_orphan_private },
    ]
}

type CheckResult = Option<(Severity, String, Option<String>)>;

fn fail(message: impl Into<String>) -> CheckResult {
    Some((Severity::Error, message.into(), None))
}

fn check_uid(ctx: &ElementContext<'_>) -> CheckResult {
    if ctx.vr != VR::UI {
        return None;
    }
    let s = ctx.as_str();
    if s.is_empty() {
        return None;
    }
    if s.len() > 64 {
        return fail(format!("UID '{}' exceeds 64 characters ({})", s, s.len()));
    }
    if s.starts_with('.') || s.ends_with('.') {
        return fail(format!("UID '{}' has a leading or trailing dot", s));
    }
    if s.contains("..") {
        return fail(format!("UID '{}' contains an empty component", s));
    }
    if !s.bytes().all(|b| b.is_ascii_digit() || b == b'.') {
        return fail(format!("UID '{}' contains characters outside [0-9.]", s));
    }
    for component in s.split('.') {
        if component.len() > 1 && component.starts_with('0') {
            return fail(format!(
                "UID '{}' has a leading zero in multi-digit component '{}'",
                s, component
            ));
        }
    }
    None
}

fn check_date(ctx: &ElementContext<'_>) -> CheckResult {
    if ctx.vr != VR::DA {
        return None;
    }
    let s = ctx.as_str();
    if s.is_empty() {
        return None;
    }
    if ![4, 6, 8].contains(&s.len()) {
        return fail(format!("date '{}' must have length 4, 6 or 8", s));
    }
    if !s.bytes().all(|b| b.is_ascii_digit()) {
        return fail(format!("date '{}' contains non-digit characters", s));
    }
    let year: u32 = s[0..4].parse().unwrap();
    let month: u32 = if s.len() >= 6 { s[4..6].parse().unwrap() } else { 1 };
    let day: u32 = if s.len() >= 8 { s[6..8].parse().unwrap() } else { 1 };
    if !(1..=12).contains(&month) {
        return fail(format!("date '{}' has invalid month {}", s, month));
    }
    if day == 0 || day > days_in_month(year, month) {
        return fail(format!("date '{}' has invalid day {}", s, day));
    }
    None
}

fn is_leap_year(year: u32) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}

fn days_in_month(year: u32, month: u32) -> u32 {
    match month {
        1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
        4 | 6 | 9 | 11 => 30,
        2 => {
            if is_leap_year(year) {
                29
            } else {
                28
            }
        }
        _ => 0,
    }
}

fn check_time(ctx: &ElementContext<'_>) -> CheckResult {
    if ctx.vr != VR::TM {
        return None;
    }
    let s = ctx.as_str();
    if s.is_empty() {
        return None;
    }
    let (main, frac) = match s.split_once('.') {
        Some((m, f)) => (m, Some(f)),
        None => (s.as_ref(), None),
    };
    if ![2, 4, 6].contains(&main.len()) {
        return fail(format!("time '{}' must have length 2, 4 or 6 before any fraction", s));
    }
    if !main.bytes().all(|b| b.is_ascii_digit()) {
        return fail(format!("time '{}' contains non-digit characters", s));
    }
    let hour: u32 = main[0..2].parse().unwrap();
    let minute: u32 = if main.len() >= 4 { main[2..4].parse().unwrap() } else { 0 };
    let second: u32 = if main.len() >= 6 { main[4..6].parse().unwrap() } else { 0 };
    if hour > 23 {
        return fail(format!("time '{}' has invalid hour {}", s, hour));
    }
    if minute > 59 {
        return fail(format!("time '{}' has invalid minute {}", s, minute));
    }
    if second > 59 {
        return fail(format!("time '{}' has invalid second {}", s, second));
    }
    if let Some(frac) = frac {
        if frac.is_empty() || frac.len() > 6 || !frac.bytes().all(|b| b.is_ascii_digit()) {
            return fail(format!("time '{}' has an invalid fractional-second component", s));
        }
    }
    None
}

fn check_code_string(ctx: &ElementContext<'_>) -> CheckResult {
    if ctx.vr != VR::CS {
        return None;
    }
    let s = ctx.as_str();
    if s.len() > 16 {
        return fail(format!("code string '{}' exceeds 16 characters", s));
    }
    if !s
        .bytes()
        .all(|b| b.is_ascii_uppercase() || b.is_ascii_digit() || b == b' ' || b == b'_')
    {
        return fail(format!(
            "code string '{}' contains characters outside [A-Z0-9 _]",
            s
        ));
    }
    None
}

fn check_age_string(ctx: &ElementContext<'_>) -> CheckResult {
    if ctx.vr != VR::AS {
        return None;
    }
    let s = ctx.as_str();
    if s.is_empty() {
        return None;
    }
    if s.len() != 4 {
        return fail(format!("age string '{}' must be exactly 4 characters", s));
    }
    let (digits, unit) = s.split_at(3);
    if !digits.bytes().all(|b| b.is_ascii_digit()) {
        return fail(format!("age string '{}' must start with 3 digits", s));
    }
    if !matches!(unit, "D" | "W" | "M" | "Y") {
        return fail(format!(
            "age string '{}' has invalid unit '{}', must be one of D/W/M/Y",
            s, unit
        ));
    }
    None
}

fn check_decimal_string(ctx: &ElementContext<'_>) -> CheckResult {
    if ctx.vr != VR::DS {
        return None;
    }
    let s = ctx.as_str();
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    if s.parse::<f64>().is_err() {
        return fail(format!("decimal string '{}' is not a valid decimal number", s));
    }
    None
}

fn check_integer_string(ctx: &ElementContext<'_>) -> CheckResult {
    if ctx.vr != VR::IS {
        return None;
    }
    let s = ctx.as_str();
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    let digits = s.strip_prefix(['+', '-']).unwrap_or(s);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return fail(format!("integer string '{}' is not a valid integer", s));
    }
    None
}

fn check_application_entity(ctx: &ElementContext<'_>) -> CheckResult {
    if ctx.vr != VR::AE {
        return None;
    }
    let s = ctx.as_str();
    if s.is_empty() {
        return None;
    }
    if s.trim().is_empty() {
        return fail("application entity title is all whitespace".to_string());
    }
    if s.contains('\\') {
        return fail(format!("application entity title '{}' contains a backslash", s));
    }
    if s.bytes().any(|b| b.is_ascii_control()) {
        return fail(format!(
            "application entity title '{}' contains a control character",
            s
        ));
    }
    None
}

/// Per-VR maximum string length, in characters, per PS3.5 Table 6.2-1.
fn max_length_for(vr: VR) -> Option<usize> {
    match vr {
        VR::AE => Some(16),
        VR::AS => Some(4),
        VR::CS => Some(16),
        VR::DA => Some(8),
        VR::DS => Some(16),
        VR::DT => Some(26),
        VR::IS => Some(12),
        VR::LO => Some(64),
        VR::SH => Some(16),
        VR::TM => Some(14),
        VR::UI => Some(64),
        VR::LT => Some(10240),
        VR::ST => Some(1024),
        VR::UC | VR::UR | VR::UT => None, // unbounded (long-VR, effectively 2^32-2)
        _ => None,
    }
}

fn check_string_length(ctx: &ElementContext<'_>) -> CheckResult {
    let max = max_length_for(ctx.vr)?;
    let s = ctx.as_str();
    if s.len() > max {
        return fail(format!(
            "value of length {} exceeds the maximum of {} for VR {}",
            s.len(),
            max,
            ctx.vr
        ));
    }
    None
}

fn check_orphan_private(ctx: &ElementContext<'_>) -> CheckResult {
    match ctx.has_private_creator {
        Some(false) => fail(format!(
            "private data element {} has no governing private creator in this dataset",
            ctx.tag
        )),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx<'a>(tag: Tag, vr: VR, value: &'a str) -> ElementContext<'a> {
        ElementContext {
            tag,
            vr,
            value: value.as_bytes(),
            has_private_creator: None,
        }
    }

    #[test]
    fn uid_format_rejects_leading_zero() {
        let profile = Profile::strict();
        let c = ctx(Tag(0x0002, 0x0010), VR::UI, "1.02.3");
        let diags = profile.validate_element(&c);
        assert!(diags.iter().any(|d| d.code == RuleCode::UidFormat));
    }

    #[test]
    fn uid_format_accepts_valid_uid() {
        let profile = Profile::strict();
        let c = ctx(Tag(0x0002, 0x0010), VR::UI, "1.2.840.10008.1.2");
        assert!(profile.validate_element(&c).is_empty());
    }

    #[test]
    fn date_leap_year() {
        let profile = Profile::strict();
        let ok = ctx(Tag(0x0008, 0x0020), VR::DA, "20240229");
        assert!(profile.validate_element(&ok).is_empty());
        let bad = ctx(Tag(0x0008, 0x0020), VR::DA, "20230229");
        let diags = profile.validate_element(&bad);
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].code, RuleCode::DateFormat);
        assert_eq!(diags[0].severity, Severity::Error);
    }

    #[test]
    fn lenient_profile_downgrades_date_to_warning() {
        let profile = Profile::lenient();
        let bad = ctx(Tag(0x0008, 0x0020), VR::DA, "20230229");
        let diags = profile.validate_element(&bad);
        assert_eq!(diags[0].severity, Severity::Warning);
    }

    #[test]
    fn permissive_profile_skips_date_rule() {
        let profile = Profile::permissive();
        let bad = ctx(Tag(0x0008, 0x0020), VR::DA, "20230229");
        assert!(profile.validate_element(&bad).is_empty());
    }

    #[test]
    fn time_rejects_out_of_range_minute() {
        let profile = Profile::strict();
        let bad = ctx(Tag(0x0008, 0x0030), VR::TM, "126000");
        let diags = profile.validate_element(&bad);
        assert_eq!(diags[0].code, RuleCode::TimeFormat);
    }

    #[test]
    fn age_string_syntax() {
        let profile = Profile::strict();
        assert!(profile.validate_element(&ctx(Tag(0x0010, 0x1010), VR::AS, "032Y")).is_empty());
        let bad = ctx(Tag(0x0010, 0x1010), VR::AS, "32Y");
        assert_eq!(profile.validate_element(&bad)[0].code, RuleCode::AgeString);
    }

    #[test]
    fn orphan_private_element() {
        let profile = Profile::strict();
        let mut c = ctx(Tag(0x0009, 0x1001), VR::SH, "X");
        c.has_private_creator = Some(false);
        let diags = profile.validate_element(&c);
        assert!(diags.iter().any(|d| d.code == RuleCode::OrphanPrivateElement));
        c.has_private_creator = Some(true);
        assert!(profile.validate_element(&c).is_empty());
    }
}
