//! Terminal rendering of runs, reports, stocks and settings

use comfy_table::{Table, presets::UTF8_FULL};
use research_analysis::{CredentialStatus, RunSummary};
use research_core::{AnalysisReport, Run, Stock, UserConfig};
use research_store::StockDetail;

fn table(header: &[&str]) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL).set_header(header.to_vec());
    table
}

fn or_dash(value: Option<impl ToString>) -> String {
    value.map_or_else(|| "-".to_string(), |v| v.to_string())
}

pub fn runs_table(runs: &[Run]) -> Table {
    let mut table = table(&["ID", "Date", "Universe", "Status", "Started", "Completed", "Notes"]);
    for run in runs {
        table.add_row(vec![
            run.id.to_string(),
            run.run_date.to_string(),
            run.universe.clone(),
            run.status.to_string(),
            or_dash(run.started_at.map(|t| t.format("%Y-%m-%d %H:%M:%S"))),
            or_dash(run.completed_at.map(|t| t.format("%Y-%m-%d %H:%M:%S"))),
            or_dash(run.notes.as_deref()),
        ]);
    }
    table
}

pub fn reports_table(reports: &[AnalysisReport]) -> Table {
    let mut table = table(&["Report", "Stock", "Type", "Entry", "Covered call", "Secured put", "Risks"]);
    for report in reports {
        table.add_row(vec![
            report.id.to_string(),
            report.stock_id.to_string(),
            report.analysis_type.to_string(),
            report.entry_rating.to_string(),
            report.covered_call_rating.to_string(),
            report.secured_put_rating.to_string(),
            report.risk_flags.len().to_string(),
        ]);
    }
    table
}

pub fn print_runs(runs: &[Run]) {
    println!("{}", runs_table(runs));
}

pub fn print_reports(reports: &[AnalysisReport]) {
    if reports.is_empty() {
        println!("No reports");
        return;
    }
    println!("{}", reports_table(reports));
}

pub fn print_summary(summary: &RunSummary) {
    println!(
        "Run {} finished: {} symbols, {} analyzed ({} degraded), {} skipped, {} failed",
        summary.run_id,
        summary.symbols,
        summary.analyzed,
        summary.degraded,
        summary.skipped,
        summary.failed.len()
    );
    if !summary.failed.is_empty() {
        println!("Failed: {}", summary.failed.join(", "));
    }
}

pub fn print_report(symbol: &str, report: &AnalysisReport) {
    println!(
        "{symbol} · {} · {} · {}",
        report.analysis_type,
        report.model,
        report.created_at.format("%Y-%m-%d %H:%M UTC")
    );
    println!();
    println!("{}", report.summary_markdown);
    println!();

    let mut ratings = table(&["Decision", "Rating", "Rationale"]);
    ratings
        .add_row(vec![
            "Entry".to_string(),
            report.entry_rating.to_string(),
            report.entry_rationale.clone(),
        ])
        .add_row(vec![
            "Covered call".to_string(),
            report.covered_call_rating.to_string(),
            report.covered_call_rationale.clone(),
        ])
        .add_row(vec![
            "Cash-secured put".to_string(),
            report.secured_put_rating.to_string(),
            report.secured_put_rationale.clone(),
        ]);
    println!("{ratings}");

    if !report.risk_flags.is_empty() {
        let mut risks = table(&["Risk", "Detail"]);
        for flag in &report.risk_flags {
            risks.add_row(vec![flag.label.clone(), flag.detail.clone()]);
        }
        println!("{risks}");
    }

    if !report.key_dates.is_empty() {
        let mut dates = table(&["Key date", "When", "Notes"]);
        for key_date in &report.key_dates {
            dates.add_row(vec![
                key_date.label.clone(),
                or_dash(key_date.date.as_deref()),
                or_dash(key_date.notes.as_deref()),
            ]);
        }
        println!("{dates}");
    }
}

pub fn print_config(config: &UserConfig) {
    let mut table = table(&["Setting", "Value"]);
    let custom = if config.custom_tickers.is_empty() {
        "-".to_string()
    } else {
        config.custom_tickers.join(", ")
    };
    table
        .add_row(vec!["Top N".to_string(), config.top_n.to_string()])
        .add_row(vec!["Universe".to_string(), config.universe.clone()])
        .add_row(vec!["Custom tickers".to_string(), custom])
        .add_row(vec!["Daily run time".to_string(), config.daily_run_time_local.clone()])
        .add_row(vec!["Time zone".to_string(), config.time_zone.clone()]);
    println!("{table}");
}

pub fn print_credentials(statuses: &[CredentialStatus]) {
    let mut table = table(&["Provider", "Stored", "Environment", "Active key"]);
    for status in statuses {
        table.add_row(vec![
            status.provider.to_string(),
            yes_no(status.stored).to_string(),
            yes_no(status.from_env).to_string(),
            or_dash(status.masked.as_deref()),
        ]);
    }
    println!("{table}");
}

fn yes_no(value: bool) -> &'static str {
    if value { "yes" } else { "no" }
}

pub fn stocks_table(stocks: &[Stock]) -> Table {
    let mut table = table(&["Symbol", "Name", "Exchange", "Sector", "Industry"]);
    for stock in stocks {
        table.add_row(vec![
            stock.symbol.clone(),
            stock.name.clone(),
            or_dash(stock.exchange.as_deref()),
            or_dash(stock.sector.as_deref()),
            or_dash(stock.industry.as_deref()),
        ]);
    }
    table
}

pub fn print_stocks(stocks: &[Stock]) {
    println!("{}", stocks_table(stocks));
}

pub fn print_stock_detail(detail: &StockDetail) {
    println!("{}", stocks_table(std::slice::from_ref(&detail.stock)));

    match &detail.latest_analysis {
        Some(report) => print_report(&detail.stock.symbol, report),
        None => println!("No analysis yet"),
    }

    if !detail.recent_news.is_empty() {
        let mut news = table(&["Published", "Title", "Source", "Issue"]);
        for article in &detail.recent_news {
            news.add_row(vec![
                article.published_at.format("%Y-%m-%d").to_string(),
                article.title.clone(),
                or_dash(article.source.as_deref()),
                if article.issue_flag { "!" } else { "" }.to_string(),
            ]);
        }
        println!("{news}");
    }

    if !detail.latest_filings.is_empty() {
        let mut filings = table(&["Filed", "Type", "Period end", "URL"]);
        for filing in &detail.latest_filings {
            filings.add_row(vec![
                filing.file_date.to_string(),
                filing.filing_type.clone(),
                or_dash(filing.period_end),
                filing.file_url.clone(),
            ]);
        }
        println!("{filings}");
    }

    if let Some(options) = &detail.latest_options {
        let mut chain = table(&["Side", "Strike", "Bid", "IV", "Delta"]);
        chain
            .add_row(vec![
                "Call".to_string(),
                format!("{:.2}", options.call_strike),
                format!("{:.2}", options.call_bid),
                or_dash(options.call_implied_vol.map(|v| format!("{v:.3}"))),
                or_dash(options.call_delta.map(|v| format!("{v:.3}"))),
            ])
            .add_row(vec![
                "Put".to_string(),
                format!("{:.2}", options.put_strike),
                format!("{:.2}", options.put_bid),
                or_dash(options.put_implied_vol.map(|v| format!("{v:.3}"))),
                or_dash(options.put_delta.map(|v| format!("{v:.3}"))),
            ]);
        println!(
            "Options at {:.2}, {} days to expiry",
            options.underlying_price, options.days_to_expiry
        );
        println!("{chain}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use research_core::RunStatus;

    #[test]
    fn test_runs_table_shows_missing_values_as_dash() {
        let run = Run {
            id: 7,
            run_date: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
            universe: "US_LARGE_CAP".to_string(),
            status: RunStatus::Failed,
            started_at: None,
            completed_at: None,
            notes: Some("Rate limit exceeded".to_string()),
        };

        let rendered = runs_table(&[run]).to_string();
        assert!(rendered.contains("2024-06-01"));
        assert!(rendered.contains("failed"));
        assert!(rendered.contains("Rate limit exceeded"));
        assert!(rendered.contains(" - "));
    }

    #[test]
    fn test_stocks_table_lists_every_stock() {
        let stock = |id: i64, symbol: &str| Stock {
            id,
            symbol: symbol.to_string(),
            name: format!("{symbol} Inc"),
            exchange: Some("NASDAQ".to_string()),
            currency: "USD".to_string(),
            sector: None,
            industry: None,
            is_tracked: true,
        };

        let rendered = stocks_table(&[stock(1, "AAPL"), stock(2, "MSFT")]).to_string();
        assert!(rendered.contains("AAPL Inc"));
        assert!(rendered.contains("MSFT Inc"));
        assert!(rendered.contains("NASDAQ"));
    }
}
