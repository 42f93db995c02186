//! Short CPU model names from raw vendor brand strings.

use std::fmt;

const OTHER_MAX_CHARS: usize = 25;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CpuVendor {
    Apple,
    Intel,
    Amd,
    Other,
}

/// Structured form of a CPU brand string.
#[derive(Debug, Clone, PartialEq)]
pub struct CpuModel {
    pub vendor: CpuVendor,
    /// Short display name such as `"Intel Core i7"` or `"Apple M2 Pro"`.
    pub family: String,
    pub frequency_ghz: Option<f64>,
}

impl fmt::Display for CpuModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.frequency_ghz {
            Some(ghz) => write!(f, "{} @ {ghz:.1} GHz", self.family),
            None => f.write_str(&self.family),
        }
    }
}

/// Parses a brand string such as `"Intel(R) Core(TM) i7-9750H CPU @ 2.60GHz"`.
///
/// `frequency_mhz` takes precedence over a frequency embedded in the brand;
/// zero is treated as unknown.
pub fn parse_cpu_model(brand: &str, frequency_mhz: Option<u64>) -> CpuModel {
    let cleaned = strip_marks(brand);
    let (name, brand_ghz) = split_frequency(&cleaned);

    let frequency_ghz = frequency_mhz
        .filter(|&mhz| mhz > 0)
        .map(|mhz| mhz as f64 / 1000.0)
        .or(brand_ghz);

    let (vendor, family) = if let Some(pos) = name.find("Apple") {
        let chip = name[pos..].split(',').next().unwrap_or_default();
        (CpuVendor::Apple, chip.trim().to_string())
    } else if let Some(pos) = name.find("Intel") {
        (CpuVendor::Intel, intel_family(&name[pos..]))
    } else if let Some(pos) = name.find("AMD") {
        (CpuVendor::Amd, amd_family(&name[pos..]))
    } else if name.is_empty() {
        (CpuVendor::Other, "Unknown CPU".to_string())
    } else {
        (CpuVendor::Other, truncate_chars(name, OTHER_MAX_CHARS))
    };

    CpuModel {
        vendor,
        family,
        frequency_ghz,
    }
}

/// Removes trademark marks and collapses whitespace.
fn strip_marks(brand: &str) -> String {
    let mut s = brand.to_string();
    for mark in ["(R)", "(r)", "(TM)", "(tm)"] {
        s = s.replace(mark, "");
    }
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Splits `"name @ 2.60GHz"` into the name and the frequency in GHz.
fn split_frequency(s: &str) -> (&str, Option<f64>) {
    match s.split_once('@') {
        Some((name, freq)) => {
            let ghz = freq
                .trim()
                .trim_end_matches("GHz")
                .trim_end_matches("GHZ")
                .trim()
                .parse()
                .ok();
            (name.trim(), ghz)
        }
        None => (s.trim(), None),
    }
}

/// `"Intel Core i7-9750H CPU"` → `"Intel Core i7"`.
fn intel_family(s: &str) -> String {
    let tokens: Vec<&str> = s.split_whitespace().collect();
    if let Some(core) = tokens.iter().position(|t| *t == "Core") {
        match tokens.get(core + 1..core + 3) {
            Some(["Ultra", tier, ..]) if tier.chars().all(|c| c.is_ascii_digit()) => {
                return format!("Intel Core Ultra {tier}");
            }
            _ => {}
        }
        if let Some(model) = tokens.get(core + 1) {
            let mut chars = model.chars();
            if chars.next() == Some('i') {
                if let Some(d) = chars.next().filter(char::is_ascii_digit) {
                    return format!("Intel Core i{d}");
                }
            }
        }
    }

    let name: Vec<&str> = tokens.into_iter().filter(|t| *t != "CPU").collect();
    truncate_chars(&name.join(" "), OTHER_MAX_CHARS)
}

/// `"AMD Ryzen 7 5800X 8-Core Processor"` → `"AMD Ryzen 7"`.
///
/// Keeps words up to the first one containing a digit; that word is kept
/// only if it is purely numeric (a tier or series number).
fn amd_family(s: &str) -> String {
    let mut out: Vec<&str> = Vec::new();
    for token in s.split_whitespace() {
        if token == "Processor" || token == "with" {
            break;
        }
        if token.chars().any(|c| c.is_ascii_digit()) {
            if token.chars().all(|c| c.is_ascii_digit()) {
                out.push(token);
            }
            break;
        }
        out.push(token);
    }
    out.join(" ")
}

fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect::<String>().trim_end().to_string()
}
