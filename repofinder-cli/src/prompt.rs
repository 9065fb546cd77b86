//! Interactive prompts for identity fields and custom weights

use std::collections::BTreeMap;
use std::io::{self, BufRead, Write};

use repofinder_core::MetricKind;

/// Keyword entry stops on this answer
pub const KEYWORD_SENTINEL: &str = "n";

pub struct Prompter<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> Prompter<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    /// Ask one question and return the trimmed answer
    pub fn ask(&mut self, question: &str) -> io::Result<String> {
        write!(self.output, "{}: ", question)?;
        self.output.flush()?;
        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "input closed"));
        }
        Ok(line.trim().to_string())
    }

    /// Collect extra keywords until the sentinel
    pub fn keywords(&mut self) -> io::Result<Vec<String>> {
        let mut keywords = Vec::new();
        loop {
            let answer = self.ask(&format!(
                "Extra keyword (enter '{}' when done)",
                KEYWORD_SENTINEL
            ))?;
            if answer.eq_ignore_ascii_case(KEYWORD_SENTINEL) {
                return Ok(keywords);
            }
            if !answer.is_empty() {
                keywords.push(answer);
            }
        }
    }

    pub fn window_months(&mut self, default: u32) -> io::Result<u32> {
        loop {
            let answer = self.ask(&format!("Activity window in months [{}]", default))?;
            if answer.is_empty() {
                return Ok(default);
            }
            match answer.parse::<u32>() {
                Ok(months) if months > 0 => return Ok(months),
                _ => writeln!(self.output, "Enter a whole number of months greater than 0")?,
            }
        }
    }

    /// Ask a weight for every metric, showing what is left of 100.
    /// Starts over if the weights do not total 100.
    pub fn weights(&mut self) -> io::Result<BTreeMap<String, f64>> {
        loop {
            let mut weights = BTreeMap::new();
            let mut remaining = 100.0_f64;

            for metric in MetricKind::ALL {
                let weight = loop {
                    let answer = self.ask(&format!(
                        "Weight for {} ({:.1}% remaining)",
                        metric.label(),
                        remaining
                    ))?;
                    let value = if answer.is_empty() { Ok(0.0) } else { answer.parse::<f64>() };
                    match value {
                        Ok(w) if w.is_finite() && w >= 0.0 && w <= remaining + 1e-6 => break w,
                        _ => writeln!(
                            self.output,
                            "Enter a number between 0 and {:.1}",
                            remaining
                        )?,
                    }
                };
                remaining -= weight;
                weights.insert(metric.key().to_string(), weight);
            }

            if remaining.abs() <= 1e-6 {
                return Ok(weights);
            }
            writeln!(
                self.output,
                "Weights total {:.1}, they must total 100. Starting over.",
                100.0 - remaining
            )?;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prompter(input: &str) -> Prompter<&[u8], Vec<u8>> {
        Prompter::new(input.as_bytes(), Vec::new())
    }

    #[test]
    fn test_keywords_stop_at_sentinel() {
        let mut p = prompter("genomics lab\n\nslugs\nn\nignored\n");
        assert_eq!(p.keywords().unwrap(), vec!["genomics lab", "slugs"]);
    }

    #[test]
    fn test_closed_input_is_error() {
        let mut p = prompter("only one\n");
        assert_eq!(
            p.keywords().unwrap_err().kind(),
            io::ErrorKind::UnexpectedEof
        );
    }

    #[test]
    fn test_window_months_default_and_retry() {
        assert_eq!(prompter("\n").window_months(6).unwrap(), 6);
        assert_eq!(prompter("0\nabc\n12\n").window_months(6).unwrap(), 12);
    }

    #[test]
    fn test_weights_total_100() {
        // 50 + 50 then blanks for the rest
        let mut input = String::from("50\n50\n");
        input.push_str(&"\n".repeat(MetricKind::ALL.len() - 2));
        let mut p = prompter(&input);

        let weights = p.weights().unwrap();
        assert_eq!(weights.len(), MetricKind::ALL.len());
        assert_eq!(weights["commits"], 50.0);
        assert_eq!(weights["active_contributors"], 50.0);
        assert_eq!(weights["discussion"], 0.0);

        let shown = String::from_utf8(p.output).unwrap();
        assert!(shown.contains("(50.0% remaining)"));
    }

    #[test]
    fn test_weights_reject_overflow_and_restart_on_short_total() {
        let n = MetricKind::ALL.len();
        // First pass: 150 is rejected, then 40 and blanks leave 60 unassigned
        let mut input = String::from("150\n40\n");
        input.push_str(&"\n".repeat(n - 1));
        // Second pass: everything on commits
        input.push_str("100\n");
        input.push_str(&"\n".repeat(n - 1));

        let mut p = prompter(&input);
        let weights = p.weights().unwrap();
        assert_eq!(weights["commits"], 100.0);

        let shown = String::from_utf8(p.output).unwrap();
        assert!(shown.contains("Enter a number between 0 and 100.0"));
        assert!(shown.contains("Starting over"));
    }
}
