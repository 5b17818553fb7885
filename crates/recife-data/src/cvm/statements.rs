//! Per-company figures derived from DFP statement lines.

use crate::cvm::dfp::{DfpRecord, FiscalOrder};
use std::collections::BTreeMap;

/// Consolidated shareholders' equity (BPP).
pub const EQUITY_TOTAL_ACCOUNT: &str = "2.08";

/// Non-controlling interests inside consolidated equity (BPP).
pub const NON_CONTROLLING_ACCOUNT: &str = "2.08.09";

const NET_INCOME_MARKER: &str = "lucro/prejuízo";
const CONTROLLING_MARKER: &str = "controladora";

/// Digits of a CNPJ, so `60.872.504/0001-23` matches `60872504000123`.
pub fn normalize_cnpj(cnpj: &str) -> String {
    cnpj.chars().filter(char::is_ascii_digit).collect()
}

fn own_year_lines<'a>(
    records: &'a [DfpRecord],
    cnpj: &str,
) -> impl Iterator<Item = &'a DfpRecord> + 'a {
    let target = normalize_cnpj(cnpj);
    records
        .iter()
        .filter(move |r| r.order == FiscalOrder::Last && normalize_cnpj(&r.cnpj) == target)
}

/// Net income attributable to the controlling shareholders, per fiscal year.
///
/// The period result is the shallowest `Lucro/Prejuízo` account of the year.
/// When that account has a child attributed to the controlling company
/// (`Atribuído a Sócios da Empresa Controladora`) the child is used instead.
pub fn extract_net_income(records: &[DfpRecord], cnpj: &str) -> BTreeMap<i32, f64> {
    let mut by_year: BTreeMap<i32, Vec<&DfpRecord>> = BTreeMap::new();
    for record in own_year_lines(records, cnpj) {
        by_year.entry(record.year()).or_default().push(record);
    }

    by_year
        .into_iter()
        .filter_map(|(year, lines)| {
            let results: Vec<&DfpRecord> = lines
                .iter()
                .copied()
                .filter(|r| r.description.to_lowercase().contains(NET_INCOME_MARKER))
                .collect();
            let depth = results.iter().map(|r| r.account_depth()).min()?;

            let total = results
                .iter()
                .filter(|r| r.account_depth() == depth)
                .map(|result| {
                    let prefix = format!("{}.", result.account_code);
                    lines
                        .iter()
                        .find(|r| {
                            r.account_code.starts_with(&prefix)
                                && r.description.to_lowercase().contains(CONTROLLING_MARKER)
                        })
                        .map_or(result.value, |child| child.value)
                })
                .sum();
            Some((year, total))
        })
        .collect()
}

/// Equity attributable to the controlling shareholders, per fiscal year.
///
/// Computed as total equity (`2.08`) minus non-controlling interests
/// (`2.08.09`). A year with only one of the two lines counts the other as 0.
pub fn extract_controlling_equity(records: &[DfpRecord], cnpj: &str) -> BTreeMap<i32, f64> {
    let mut equity: BTreeMap<i32, f64> = BTreeMap::new();

    for record in own_year_lines(records, cnpj) {
        let sign = match record.account_code.as_str() {
            EQUITY_TOTAL_ACCOUNT => 1.0,
            NON_CONTROLLING_ACCOUNT => -1.0,
            _ => continue,
        };
        *equity.entry(record.year()).or_default() += sign * record.value;
    }

    equity
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cvm::dfp::StatementKind;
    use approx::assert_relative_eq;
    use chrono::NaiveDate;

    const ITAU: &str = "60.872.504/0001-23";
    const BB: &str = "00.000.000/0001-91";

    fn line(
        kind: StatementKind,
        cnpj: &str,
        year: i32,
        order: FiscalOrder,
        code: &str,
        description: &str,
        value: f64,
    ) -> DfpRecord {
        DfpRecord {
            kind,
            cnpj: cnpj.to_string(),
            reference_date: NaiveDate::from_ymd_opt(year, 12, 31).unwrap(),
            period_end: NaiveDate::from_ymd_opt(year, 12, 31),
            order,
            account_code: code.to_string(),
            description: description.to_string(),
            value,
        }
    }

    fn dre(cnpj: &str, year: i32, code: &str, description: &str, value: f64) -> DfpRecord {
        line(StatementKind::Income, cnpj, year, FiscalOrder::Last, code, description, value)
    }

    fn bpp(cnpj: &str, year: i32, code: &str, value: f64) -> DfpRecord {
        line(
            StatementKind::BalanceSheetLiabilities,
            cnpj,
            year,
            FiscalOrder::Last,
            code,
            "Patrimônio Líquido",
            value,
        )
    }

    #[test]
    fn test_normalize_cnpj() {
        assert_eq!(normalize_cnpj(ITAU), "60872504000123");
        assert_eq!(normalize_cnpj("60872504000123"), "60872504000123");
    }

    #[test]
    fn test_net_income_prefers_controlling_line() {
        let records = vec![
            dre(ITAU, 2022, "3.11", "Lucro/Prejuízo Consolidado do Período", 31_000.0),
            dre(ITAU, 2022, "3.11.01", "Atribuído a Sócios da Empresa Controladora", 29_000.0),
            dre(ITAU, 2022, "3.11.02", "Atribuído a Sócios Não Controladores", 2_000.0),
        ];

        let income = extract_net_income(&records, ITAU);
        assert_relative_eq!(income[&2022], 29_000.0);
    }

    #[test]
    fn test_net_income_falls_back_to_period_result() {
        let records = vec![
            dre(BB, 2021, "3.11", "Lucro/Prejuízo do Período", 21_000.0),
            dre(BB, 2021, "3.99", "Lucro por Ação", 7.0),
        ];
        let income = extract_net_income(&records, BB);
        assert_eq!(income.len(), 1);
        assert_relative_eq!(income[&2021], 21_000.0);
    }

    #[test]
    fn test_net_income_ignores_prior_year_and_other_companies() {
        let mut prior = dre(ITAU, 2021, "3.11", "Lucro/Prejuízo do Período", 1.0);
        prior.order = FiscalOrder::Previous;
        let records = vec![
            prior,
            dre(BB, 2021, "3.11", "Lucro/Prejuízo do Período", 5.0),
            dre(ITAU, 2022, "3.11", "LUCRO/PREJUÍZO DO PERÍODO", 9.0),
        ];

        let income = extract_net_income(&records, "60872504000123");
        assert_eq!(income.keys().copied().collect::<Vec<_>>(), vec![2022]);
        assert_relative_eq!(income[&2022], 9.0);
    }

    #[test]
    fn test_controlling_equity_subtracts_minorities() {
        let records = vec![
            bpp(ITAU, 2022, "2.08", 200_000.0),
            bpp(ITAU, 2022, "2.08.09", 15_000.0),
            bpp(ITAU, 2023, "2.08", 220_000.0),
            bpp(ITAU, 2023, "2.08.01", 90_000.0),
        ];
        let equity = extract_controlling_equity(&records, ITAU);

        assert_relative_eq!(equity[&2022], 185_000.0);
        assert_relative_eq!(equity[&2023], 220_000.0);
    }

    #[test]
    fn test_controlling_equity_missing_total_counts_as_zero() {
        let records = vec![bpp(ITAU, 2022, "2.08.09", 15_000.0)];
        let equity = extract_controlling_equity(&records, ITAU);

        assert_eq!(equity.len(), 1);
        assert_relative_eq!(equity[&2022], -15_000.0);
    }

    #[test]
    fn test_controlling_equity_without_equity_lines_is_empty() {
        let records = vec![bpp(ITAU, 2022, "2.07", 15_000.0)];
        assert!(extract_controlling_equity(&records, ITAU).is_empty());
    }
}
