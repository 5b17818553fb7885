//! Text renderings of valuation results.
//!
//! Rates are shown as percentages with one decimal (`12.3%`) and BRL
//! amounts with `.` thousands separators (`R$ 1.234.567`).

use crate::export::BankValuation;
use crate::pivot::PivotTable;
use recife_valuation::BankSummary;

/// Format a rate as a percentage with one decimal.
pub fn format_pct(value: f64) -> String {
    format!("{:.1}%", value * 100.0)
}

/// Format a BRL amount, rounded to units, with thousands separators.
pub fn format_brl(value: f64) -> String {
    let rounded = value.round();
    let digits = format!("{:.0}", rounded.abs());

    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(c);
    }

    if rounded < 0.0 {
        format!("-R$ {}", grouped)
    } else {
        format!("R$ {}", grouped)
    }
}

/// Lowercase ASCII file name for a bank (`Itaú Unibanco` -> `itau_unibanco`).
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    for c in name.chars() {
        let c = match c {
            'á' | 'à' | 'â' | 'ã' | 'ä' | 'Á' | 'À' | 'Â' | 'Ã' | 'Ä' => 'a',
            'é' | 'ê' | 'è' | 'É' | 'Ê' | 'È' => 'e',
            'í' | 'ì' | 'Í' | 'Ì' => 'i',
            'ó' | 'ô' | 'õ' | 'ò' | 'Ó' | 'Ô' | 'Õ' | 'Ò' => 'o',
            'ú' | 'ù' | 'ü' | 'Ú' | 'Ù' | 'Ü' => 'u',
            'ç' | 'Ç' => 'c',
            other => other,
        };
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('_') {
            slug.push('_');
        }
    }
    slug.trim_end_matches('_').to_string()
}

impl BankValuation {
    /// Render the `Ano | ROE | Ke | Spread` table as ASCII.
    pub fn to_ascii_table(&self) -> String {
        let mut output = String::new();

        output.push_str(&format!("\n{} ({})\n", self.bank, self.ticker));
        if let Some(first) = self.rows.first() {
            output.push_str(&format!("Beta: {:.4}\n", first.beta));
        }
        output.push_str(&"=".repeat(44));
        output.push('\n');

        output.push_str(&format!(
            "{:<8} {:>10} {:>10} {:>12}\n",
            "Ano", "ROE", "Ke", "Spread"
        ));
        output.push_str(&"-".repeat(44));
        output.push('\n');

        for row in &self.rows {
            output.push_str(&format!(
                "{:<8} {:>10} {:>10} {:>12}\n",
                row.year,
                format_pct(row.roe),
                format_pct(row.ke),
                format_pct(row.spread)
            ));
        }

        output
    }

    /// Render the full per-year table as Markdown.
    pub fn to_markdown(&self) -> String {
        let mut output = String::new();

        output.push_str(&format!("## {} ({})\n\n", self.bank, self.ticker));
        output.push_str(
            "| Ano | Lucro Líquido | PL Inicial | ROE | Beta | Rf | Rm | Ke | Spread | Excess Return |\n",
        );
        output.push_str(
            "|-----|---------------|------------|-----|------|----|----|----|--------|---------------|\n",
        );

        for row in &self.rows {
            output.push_str(&format!(
                "| {} | {} | {} | {} | {:.2} | {} | {} | {} | {} | {} |\n",
                row.year,
                format_brl(row.net_income),
                format_brl(row.opening_equity),
                format_pct(row.roe),
                row.beta,
                format_pct(row.rf),
                format_pct(row.rm),
                format_pct(row.ke),
                format_pct(row.spread),
                format_brl(row.excess_return)
            ));
        }

        output
    }
}

/// Render the per-bank summary table as ASCII.
pub fn summary_ascii_table(summaries: &[BankSummary]) -> String {
    let mut output = String::new();

    output.push_str("\nExcess Return Summary\n");
    output.push_str(&"=".repeat(96));
    output.push('\n');
    output.push_str(&format!(
        "{:<18} {:>11} {:>6} {:>9} {:>9} {:>9} {:>8} {:>20}\n",
        "Bank", "Years", "Beta", "ROE", "Ke", "Spread", "ROE>Ke", "Excess Return"
    ));
    output.push_str(&"-".repeat(96));
    output.push('\n');

    for s in summaries {
        output.push_str(&format!(
            "{:<18} {:>11} {:>6.2} {:>9} {:>9} {:>9} {:>8} {:>20}\n",
            s.bank,
            format!("{}-{}", s.first_year, s.last_year),
            s.beta,
            format_pct(s.mean_roe),
            format_pct(s.mean_ke),
            format_pct(s.mean_spread),
            format!("{}/{}", s.positive_spread_years, s.years),
            format_brl(s.cumulative_excess_return)
        ));
    }

    output
}

/// Render the per-bank summary table as Markdown.
pub fn summary_markdown_table(summaries: &[BankSummary]) -> String {
    let mut output = String::new();

    output.push_str("| Bank | Years | Beta | Mean ROE | Mean Ke | Mean Spread | ROE > Ke | Cumulative Excess Return |\n");
    output.push_str("|------|-------|------|----------|---------|-------------|----------|--------------------------|\n");

    for s in summaries {
        output.push_str(&format!(
            "| {} | {}-{} | {:.2} | {} | {} | {} | {}/{} | {} |\n",
            s.bank,
            s.first_year,
            s.last_year,
            s.beta,
            format_pct(s.mean_roe),
            format_pct(s.mean_ke),
            format_pct(s.mean_spread),
            s.positive_spread_years,
            s.years,
            format_brl(s.cumulative_excess_return)
        ));
    }

    output
}

impl PivotTable {
    /// Render the table as Markdown. Empty cells are shown as `-`.
    pub fn to_markdown(&self) -> String {
        let mut output = String::new();

        output.push_str(&format!("## {}\n\n", self.metric.title()));
        output.push_str("| Ano |");
        for bank in &self.banks {
            output.push_str(&format!(" {} |", bank));
        }
        output.push('\n');
        output.push_str("|-----|");
        for _ in &self.banks {
            output.push_str("---|");
        }
        output.push('\n');

        for row in &self.rows {
            output.push_str(&format!("| {} |", row.year));
            for value in &row.values {
                let cell = match value {
                    Some(v) if self.metric.is_rate() => format_pct(*v),
                    Some(v) => format_brl(*v),
                    None => "-".to_string(),
                };
                output.push_str(&format!(" {} |", cell));
            }
            output.push('\n');
        }

        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pivot::PivotMetric;
    use recife_valuation::ValuationRow;
    use rstest::rstest;

    fn row(year: i32) -> ValuationRow {
        ValuationRow {
            year,
            net_income: 33_100_000_000.0,
            equity: 182_000_000_000.0,
            opening_equity: 160_000_000_000.0,
            roe: 0.206875,
            beta: 0.8512,
            rf: 0.1304,
            rm: 0.2228,
            equity_risk_premium: 0.0924,
            ke: 0.2091,
            spread: -0.002225,
            excess_return: -356_000_000.0,
        }
    }

    fn summary() -> BankSummary {
        BankSummary {
            bank: "Banco do Brasil".to_string(),
            years: 10,
            first_year: 2015,
            last_year: 2024,
            beta: 1.32,
            mean_roe: 0.151,
            mean_ke: 0.172,
            mean_spread: -0.021,
            positive_spread_years: 4,
            cumulative_excess_return: -12_345_678_901.0,
        }
    }

    #[rstest]
    #[case(0.123, "12.3%")]
    #[case(-0.0057, "-0.6%")]
    #[case(0.0, "0.0%")]
    #[case(1.0, "100.0%")]
    fn test_format_pct(#[case] value: f64, #[case] expected: &str) {
        assert_eq!(format_pct(value), expected);
    }

    #[rstest]
    #[case(1_234_567.4, "R$ 1.234.567")]
    #[case(999.0, "R$ 999")]
    #[case(1_000.0, "R$ 1.000")]
    #[case(-35_600_000_000.0, "-R$ 35.600.000.000")]
    #[case(0.2, "R$ 0")]
    fn test_format_brl(#[case] value: f64, #[case] expected: &str) {
        assert_eq!(format_brl(value), expected);
    }

    #[rstest]
    #[case("Itaú Unibanco", "itau_unibanco")]
    #[case("Banco do Brasil", "banco_do_brasil")]
    #[case("Santander BR", "santander_br")]
    #[case("  Bradesco!", "bradesco")]
    fn test_slugify(#[case] name: &str, #[case] expected: &str) {
        assert_eq!(slugify(name), expected);
    }

    #[test]
    fn test_bank_ascii_table() {
        let valuation = BankValuation::new(
            "Itaú Unibanco".to_string(),
            "ITUB4.SA".to_string(),
            vec![row(2023)],
        );
        let ascii = valuation.to_ascii_table();

        assert!(ascii.contains("Itaú Unibanco (ITUB4.SA)"));
        assert!(ascii.contains("Beta: 0.8512"));
        assert!(ascii.contains("20.7%"));
        assert!(ascii.contains("20.9%"));
        assert!(ascii.contains("-0.2%"));
    }

    #[test]
    fn test_bank_markdown() {
        let valuation = BankValuation::new(
            "Itaú Unibanco".to_string(),
            "ITUB4.SA".to_string(),
            vec![row(2023)],
        );
        let markdown = valuation.to_markdown();

        assert!(markdown.starts_with("## Itaú Unibanco (ITUB4.SA)"));
        assert!(markdown.contains("| 2023 | R$ 33.100.000.000 | R$ 160.000.000.000 | 20.7% |"));
    }

    #[test]
    fn test_summary_tables() {
        let summaries = vec![summary()];

        let ascii = summary_ascii_table(&summaries);
        assert!(ascii.contains("Banco do Brasil"));
        assert!(ascii.contains("2015-2024"));
        assert!(ascii.contains("4/10"));

        let markdown = summary_markdown_table(&summaries);
        assert!(markdown.contains("| Banco do Brasil | 2015-2024 | 1.32 | 15.1% | 17.2% | -2.1% | 4/10 | -R$ 12.345.678.901 |"));
    }

    #[test]
    fn test_pivot_markdown() {
        let valuations = vec![BankValuation::new(
            "Bradesco".to_string(),
            "BBDC4.SA".to_string(),
            vec![row(2023)],
        )];
        let markdown = PivotTable::from_rows(PivotMetric::Spread, &valuations).to_markdown();

        assert!(markdown.starts_with("## Spread de Valor"));
        assert!(markdown.contains("| Ano | Bradesco |"));
        assert!(markdown.contains("| 2023 | -0.2% |"));
    }
}
