// =============================================================================
// Relational adapter — bulk UPSERT of fundamentals into Postgres
// =============================================================================
//
// Every upsert is one transaction: the rows are written in 500-row pages with
// INSERT ... ON CONFLICT (natural key) DO UPDATE SET <every non-key column> =
// EXCLUDED.<column>, and either all pages commit or the transaction rolls
// back and the caller records a failure.
// =============================================================================

use std::collections::HashMap;

use anyhow::{Context, Result};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Postgres, QueryBuilder};
use tracing::info;

use crate::config::PostgresConfig;
use crate::vendor::models::{
    BalanceSheet, CashFlow, CompanyOverview, DailyPrice, IncomeStatement, NewsArticle,
    NewsStockRow, StockListing,
};

/// Rows per INSERT round-trip.
const PAGE_SIZE: usize = 500;

pub struct FundamentalsStore {
    pool: PgPool,
}

/// Append `ON CONFLICT (<key>) DO UPDATE SET col = EXCLUDED.col, ...` for the
/// given non-key columns, optionally stamping `last_updated`.
fn push_conflict_update(
    qb: &mut QueryBuilder<'_, Postgres>,
    key: &str,
    columns: &[&str],
    touch_last_updated: bool,
) {
    qb.push(" ON CONFLICT (");
    qb.push(key);
    qb.push(") DO UPDATE SET ");
    let mut sep = qb.separated(", ");
    for col in columns {
        sep.push(format!("{col} = EXCLUDED.{col}"));
    }
    if touch_last_updated {
        sep.push("last_updated = CURRENT_TIMESTAMP");
    }
}

impl FundamentalsStore {
    pub async fn connect(cfg: &PostgresConfig) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(&cfg.url())
            .await
            .with_context(|| format!("failed to connect to Postgres at {}:{}", cfg.host, cfg.port))?;
        info!(host = %cfg.host, database = %cfg.database, "Postgres connection established");
        Ok(Self { pool })
    }

    // -------------------------------------------------------------------------
    // daily_prices (symbol, date)
    // -------------------------------------------------------------------------

    pub async fn upsert_daily_prices(&self, rows: &[DailyPrice]) -> Result<()> {
        if rows.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await.context("begin daily_prices tx")?;
        for page in rows.chunks(PAGE_SIZE) {
            let mut qb: QueryBuilder<'_, Postgres> = QueryBuilder::new(
                "INSERT INTO daily_prices (symbol, date, open, high, low, close, volume) ",
            );
            qb.push_values(page, |mut b, r| {
                b.push_bind(&r.symbol)
                    .push_bind(r.date)
                    .push_bind(r.open)
                    .push_bind(r.high)
                    .push_bind(r.low)
                    .push_bind(r.close)
                    .push_bind(r.volume);
            });
            push_conflict_update(
                &mut qb,
                "symbol, date",
                &["open", "high", "low", "close", "volume"],
                false,
            );
            qb.build()
                .execute(&mut *tx)
                .await
                .context("upsert daily_prices page")?;
        }
        tx.commit().await.context("commit daily_prices tx")?;

        info!(count = rows.len(), "upserted daily price records");
        Ok(())
    }

    // -------------------------------------------------------------------------
    // stocks (symbol)
    // -------------------------------------------------------------------------

    pub async fn upsert_stocks(&self, rows: &[StockListing]) -> Result<()> {
        if rows.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await.context("begin stocks tx")?;
        for page in rows.chunks(PAGE_SIZE) {
            let mut qb: QueryBuilder<'_, Postgres> = QueryBuilder::new(
                "INSERT INTO stocks (symbol, name, exchange, asset_type, ipo_date, \
                 delisting_date, status) ",
            );
            qb.push_values(page, |mut b, r| {
                b.push_bind(&r.symbol)
                    .push_bind(&r.name)
                    .push_bind(&r.exchange)
                    .push_bind(&r.asset_type)
                    .push_bind(r.ipo_date)
                    .push_bind(r.delisting_date)
                    .push_bind(&r.status);
            });
            push_conflict_update(
                &mut qb,
                "symbol",
                &[
                    "name",
                    "exchange",
                    "asset_type",
                    "ipo_date",
                    "delisting_date",
                    "status",
                ],
                true,
            );
            qb.build()
                .execute(&mut *tx)
                .await
                .context("upsert stocks page")?;
        }
        tx.commit().await.context("commit stocks tx")?;

        info!(count = rows.len(), "upserted stock listings");
        Ok(())
    }

    // -------------------------------------------------------------------------
    // company_overview (symbol)
    // -------------------------------------------------------------------------

    pub async fn upsert_company_overview(&self, rows: &[CompanyOverview]) -> Result<()> {
        if rows.is_empty() {
            return Ok(());
        }

        const UPDATE_COLUMNS: &[&str] = &[
            "description",
            "currency",
            "country",
            "sector",
            "industry",
            "address",
            "fiscal_year_end",
            "latest_quarter",
            "market_capitalization",
            "ebitda",
            "pe_ratio",
            "peg_ratio",
            "book_value",
            "dividend_per_share",
            "dividend_yield",
            "eps",
            "revenue_per_share_ttm",
            "profit_margin",
            "operating_margin_ttm",
            "return_on_assets_ttm",
            "return_on_equity_ttm",
            "revenue_ttm",
            "gross_profit_ttm",
            "diluted_eps_ttm",
            "quarterly_earnings_growth_yoy",
            "quarterly_revenue_growth_yoy",
            "analyst_target_price",
            "trailing_pe",
            "forward_pe",
            "price_to_sales_ratio_ttm",
            "price_to_book_ratio",
            "ev_to_revenue",
            "ev_to_ebitda",
            "beta",
            "fifty_two_week_high",
            "fifty_two_week_low",
            "fifty_day_moving_average",
            "two_hundred_day_moving_average",
            "shares_outstanding",
            "shares_float",
            "shares_short",
            "shares_short_prior_month",
            "short_ratio",
            "short_percent_outstanding",
            "short_percent_float",
            "percent_insiders",
            "percent_institutions",
            "forward_annual_dividend_rate",
            "forward_annual_dividend_yield",
            "payout_ratio",
            "dividend_date",
            "ex_dividend_date",
            "last_split_factor",
            "last_split_date",
        ];

        let mut tx = self
            .pool
            .begin()
            .await
            .context("begin company_overview tx")?;
        for page in rows.chunks(PAGE_SIZE) {
            let mut qb: QueryBuilder<'_, Postgres> = QueryBuilder::new(
                "INSERT INTO company_overview (symbol, description, currency, country, sector, \
                 industry, address, fiscal_year_end, latest_quarter, market_capitalization, \
                 ebitda, pe_ratio, peg_ratio, book_value, dividend_per_share, dividend_yield, \
                 eps, revenue_per_share_ttm, profit_margin, operating_margin_ttm, \
                 return_on_assets_ttm, return_on_equity_ttm, revenue_ttm, gross_profit_ttm, \
                 diluted_eps_ttm, quarterly_earnings_growth_yoy, quarterly_revenue_growth_yoy, \
                 analyst_target_price, trailing_pe, forward_pe, price_to_sales_ratio_ttm, \
                 price_to_book_ratio, ev_to_revenue, ev_to_ebitda, beta, fifty_two_week_high, \
                 fifty_two_week_low, fifty_day_moving_average, two_hundred_day_moving_average, \
                 shares_outstanding, shares_float, shares_short, shares_short_prior_month, \
                 short_ratio, short_percent_outstanding, short_percent_float, percent_insiders, \
                 percent_institutions, forward_annual_dividend_rate, \
                 forward_annual_dividend_yield, payout_ratio, dividend_date, ex_dividend_date, \
                 last_split_factor, last_split_date) ",
            );
            qb.push_values(page, |mut b, r| {
                b.push_bind(&r.symbol)
                    .push_bind(&r.description)
                    .push_bind(&r.currency)
                    .push_bind(&r.country)
                    .push_bind(&r.sector)
                    .push_bind(&r.industry)
                    .push_bind(&r.address)
                    .push_bind(&r.fiscal_year_end)
                    .push_bind(r.latest_quarter)
                    .push_bind(r.market_capitalization)
                    .push_bind(r.ebitda)
                    .push_bind(r.pe_ratio)
                    .push_bind(r.peg_ratio)
                    .push_bind(r.book_value)
                    .push_bind(r.dividend_per_share)
                    .push_bind(r.dividend_yield)
                    .push_bind(r.eps)
                    .push_bind(r.revenue_per_share_ttm)
                    .push_bind(r.profit_margin)
                    .push_bind(r.operating_margin_ttm)
                    .push_bind(r.return_on_assets_ttm)
                    .push_bind(r.return_on_equity_ttm)
                    .push_bind(r.revenue_ttm)
                    .push_bind(r.gross_profit_ttm)
                    .push_bind(r.diluted_eps_ttm)
                    .push_bind(r.quarterly_earnings_growth_yoy)
                    .push_bind(r.quarterly_revenue_growth_yoy)
                    .push_bind(r.analyst_target_price)
                    .push_bind(r.trailing_pe)
                    .push_bind(r.forward_pe)
                    .push_bind(r.price_to_sales_ratio_ttm)
                    .push_bind(r.price_to_book_ratio)
                    .push_bind(r.ev_to_revenue)
                    .push_bind(r.ev_to_ebitda)
                    .push_bind(r.beta)
                    .push_bind(r.fifty_two_week_high)
                    .push_bind(r.fifty_two_week_low)
                    .push_bind(r.fifty_day_moving_average)
                    .push_bind(r.two_hundred_day_moving_average)
                    .push_bind(r.shares_outstanding)
                    .push_bind(r.shares_float)
                    .push_bind(r.shares_short)
                    .push_bind(r.shares_short_prior_month)
                    .push_bind(r.short_ratio)
                    .push_bind(r.short_percent_outstanding)
                    .push_bind(r.short_percent_float)
                    .push_bind(r.percent_insiders)
                    .push_bind(r.percent_institutions)
                    .push_bind(r.forward_annual_dividend_rate)
                    .push_bind(r.forward_annual_dividend_yield)
                    .push_bind(r.payout_ratio)
                    .push_bind(r.dividend_date)
                    .push_bind(r.ex_dividend_date)
                    .push_bind(&r.last_split_factor)
                    .push_bind(r.last_split_date);
            });
            push_conflict_update(&mut qb, "symbol", UPDATE_COLUMNS, true);
            qb.build()
                .execute(&mut *tx)
                .await
                .context("upsert company_overview page")?;
        }
        tx.commit().await.context("commit company_overview tx")?;

        info!(count = rows.len(), "upserted company overview records");
        Ok(())
    }

    // -------------------------------------------------------------------------
    // income_statements (symbol, fiscal_date_ending, is_quarterly)
    // -------------------------------------------------------------------------

    pub async fn upsert_income_statements(&self, rows: &[IncomeStatement]) -> Result<()> {
        if rows.is_empty() {
            return Ok(());
        }

        const UPDATE_COLUMNS: &[&str] = &[
            "reported_currency",
            "gross_profit",
            "total_revenue",
            "cost_of_revenue",
            "cost_of_goods_and_services_sold",
            "operating_income",
            "selling_general_and_administrative",
            "research_and_development",
            "operating_expenses",
            "investment_income_net",
            "net_interest_income",
            "interest_income",
            "interest_expense",
            "non_interest_income",
            "other_non_operating_income",
            "depreciation",
            "depreciation_and_amortization",
            "income_before_tax",
            "income_tax_expense",
            "interest_and_debt_expense",
            "net_income_from_continuing_operations",
            "comprehensive_income_net_of_tax",
            "ebit",
            "ebitda",
            "net_income",
        ];

        let mut tx = self
            .pool
            .begin()
            .await
            .context("begin income_statements tx")?;
        for page in rows.chunks(PAGE_SIZE) {
            let mut qb: QueryBuilder<'_, Postgres> = QueryBuilder::new(
                "INSERT INTO income_statements (symbol, fiscal_date_ending, reported_currency, \
                 gross_profit, total_revenue, cost_of_revenue, \
                 cost_of_goods_and_services_sold, operating_income, \
                 selling_general_and_administrative, research_and_development, \
                 operating_expenses, investment_income_net, net_interest_income, \
                 interest_income, interest_expense, non_interest_income, \
                 other_non_operating_income, depreciation, depreciation_and_amortization, \
                 income_before_tax, income_tax_expense, interest_and_debt_expense, \
                 net_income_from_continuing_operations, comprehensive_income_net_of_tax, ebit, \
                 ebitda, net_income, is_quarterly) ",
            );
            qb.push_values(page, |mut b, r| {
                b.push_bind(&r.symbol)
                    .push_bind(r.fiscal_date_ending)
                    .push_bind(&r.reported_currency)
                    .push_bind(r.gross_profit)
                    .push_bind(r.total_revenue)
                    .push_bind(r.cost_of_revenue)
                    .push_bind(r.cost_of_goods_and_services_sold)
                    .push_bind(r.operating_income)
                    .push_bind(r.selling_general_and_administrative)
                    .push_bind(r.research_and_development)
                    .push_bind(r.operating_expenses)
                    .push_bind(r.investment_income_net)
                    .push_bind(r.net_interest_income)
                    .push_bind(r.interest_income)
                    .push_bind(r.interest_expense)
                    .push_bind(r.non_interest_income)
                    .push_bind(r.other_non_operating_income)
                    .push_bind(r.depreciation)
                    .push_bind(r.depreciation_and_amortization)
                    .push_bind(r.income_before_tax)
                    .push_bind(r.income_tax_expense)
                    .push_bind(r.interest_and_debt_expense)
                    .push_bind(r.net_income_from_continuing_operations)
                    .push_bind(r.comprehensive_income_net_of_tax)
                    .push_bind(r.ebit)
                    .push_bind(r.ebitda)
                    .push_bind(r.net_income)
                    .push_bind(r.is_quarterly);
            });
            push_conflict_update(
                &mut qb,
                "symbol, fiscal_date_ending, is_quarterly",
                UPDATE_COLUMNS,
                true,
            );
            qb.build()
                .execute(&mut *tx)
                .await
                .context("upsert income_statements page")?;
        }
        tx.commit().await.context("commit income_statements tx")?;

        info!(count = rows.len(), "upserted income statement records");
        Ok(())
    }

    // -------------------------------------------------------------------------
    // balance_sheets (symbol, fiscal_date_ending, is_quarterly)
    // -------------------------------------------------------------------------

    pub async fn upsert_balance_sheets(&self, rows: &[BalanceSheet]) -> Result<()> {
        if rows.is_empty() {
            return Ok(());
        }

        const UPDATE_COLUMNS: &[&str] = &[
            "reported_currency",
            "total_assets",
            "total_current_assets",
            "cash_and_cash_equivalents_at_carrying_value",
            "cash_and_short_term_investments",
            "inventory",
            "current_net_receivables",
            "total_non_current_assets",
            "property_plant_equipment",
            "accumulated_depreciation_amortization_ppe",
            "intangible_assets",
            "intangible_assets_excluding_goodwill",
            "goodwill",
            "investments",
            "long_term_investments",
            "short_term_investments",
            "other_current_assets",
            "other_non_current_assets",
            "total_liabilities",
            "total_current_liabilities",
            "current_accounts_payable",
            "deferred_revenue",
            "current_debt",
            "short_term_debt",
            "total_non_current_liabilities",
            "capital_lease_obligations",
            "long_term_debt",
            "current_long_term_debt",
            "long_term_debt_noncurrent",
            "short_long_term_debt_total",
            "other_current_liabilities",
            "other_non_current_liabilities",
            "total_shareholder_equity",
            "treasury_stock",
            "retained_earnings",
            "common_stock",
            "common_stock_shares_outstanding",
        ];

        let mut tx = self.pool.begin().await.context("begin balance_sheets tx")?;
        for page in rows.chunks(PAGE_SIZE) {
            let mut qb: QueryBuilder<'_, Postgres> = QueryBuilder::new(
                "INSERT INTO balance_sheets (symbol, fiscal_date_ending, reported_currency, \
                 total_assets, total_current_assets, \
                 cash_and_cash_equivalents_at_carrying_value, \
                 cash_and_short_term_investments, inventory, current_net_receivables, \
                 total_non_current_assets, property_plant_equipment, \
                 accumulated_depreciation_amortization_ppe, intangible_assets, \
                 intangible_assets_excluding_goodwill, goodwill, investments, \
                 long_term_investments, short_term_investments, other_current_assets, \
                 other_non_current_assets, total_liabilities, total_current_liabilities, \
                 current_accounts_payable, deferred_revenue, current_debt, short_term_debt, \
                 total_non_current_liabilities, capital_lease_obligations, long_term_debt, \
                 current_long_term_debt, long_term_debt_noncurrent, \
                 short_long_term_debt_total, other_current_liabilities, \
                 other_non_current_liabilities, total_shareholder_equity, treasury_stock, \
                 retained_earnings, common_stock, common_stock_shares_outstanding, \
                 is_quarterly) ",
            );
            qb.push_values(page, |mut b, r| {
                b.push_bind(&r.symbol)
                    .push_bind(r.fiscal_date_ending)
                    .push_bind(&r.reported_currency)
                    .push_bind(r.total_assets)
                    .push_bind(r.total_current_assets)
                    .push_bind(r.cash_and_cash_equivalents_at_carrying_value)
                    .push_bind(r.cash_and_short_term_investments)
                    .push_bind(r.inventory)
                    .push_bind(r.current_net_receivables)
                    .push_bind(r.total_non_current_assets)
                    .push_bind(r.property_plant_equipment)
                    .push_bind(r.accumulated_depreciation_amortization_ppe)
                    .push_bind(r.intangible_assets)
                    .push_bind(r.intangible_assets_excluding_goodwill)
                    .push_bind(r.goodwill)
                    .push_bind(r.investments)
                    .push_bind(r.long_term_investments)
                    .push_bind(r.short_term_investments)
                    .push_bind(r.other_current_assets)
                    .push_bind(r.other_non_current_assets)
                    .push_bind(r.total_liabilities)
                    .push_bind(r.total_current_liabilities)
                    .push_bind(r.current_accounts_payable)
                    .push_bind(r.deferred_revenue)
                    .push_bind(r.current_debt)
                    .push_bind(r.short_term_debt)
                    .push_bind(r.total_non_current_liabilities)
                    .push_bind(r.capital_lease_obligations)
                    .push_bind(r.long_term_debt)
                    .push_bind(r.current_long_term_debt)
                    .push_bind(r.long_term_debt_noncurrent)
                    .push_bind(r.short_long_term_debt_total)
                    .push_bind(r.other_current_liabilities)
                    .push_bind(r.other_non_current_liabilities)
                    .push_bind(r.total_shareholder_equity)
                    .push_bind(r.treasury_stock)
                    .push_bind(r.retained_earnings)
                    .push_bind(r.common_stock)
                    .push_bind(r.common_stock_shares_outstanding)
                    .push_bind(r.is_quarterly);
            });
            push_conflict_update(
                &mut qb,
                "symbol, fiscal_date_ending, is_quarterly",
                UPDATE_COLUMNS,
                true,
            );
            qb.build()
                .execute(&mut *tx)
                .await
                .context("upsert balance_sheets page")?;
        }
        tx.commit().await.context("commit balance_sheets tx")?;

        info!(count = rows.len(), "upserted balance sheet records");
        Ok(())
    }

    // -------------------------------------------------------------------------
    // cash_flows (symbol, fiscal_date_ending, is_quarterly)
    // -------------------------------------------------------------------------

    pub async fn upsert_cash_flows(&self, rows: &[CashFlow]) -> Result<()> {
        if rows.is_empty() {
            return Ok(());
        }

        const UPDATE_COLUMNS: &[&str] = &[
            "reported_currency",
            "operating_cashflow",
            "payments_for_operating_activities",
            "proceeds_from_operating_activities",
            "change_in_operating_liabilities",
            "change_in_operating_assets",
            "depreciation_depletion_and_amortization",
            "capital_expenditures",
            "change_in_receivables",
            "change_in_inventory",
            "profit_loss",
            "cashflow_from_investment",
            "cashflow_from_financing",
            "proceeds_from_repayments_of_short_term_debt",
            "payments_for_repurchase_of_common_stock",
            "payments_for_repurchase_of_equity",
            "payments_for_repurchase_of_preferred_stock",
            "dividend_payout",
            "dividend_payout_common_stock",
            "dividend_payout_preferred_stock",
            "proceeds_from_issuance_of_common_stock",
            "proceeds_from_issuance_of_long_term_debt_and_capital_securities",
            "proceeds_from_issuance_of_preferred_stock",
            "proceeds_from_repurchase_of_equity",
            "proceeds_from_sale_of_treasury_stock",
            "change_in_cash_and_cash_equivalents",
            "change_in_exchange_rate",
            "net_income",
        ];

        let mut tx = self.pool.begin().await.context("begin cash_flows tx")?;
        for page in rows.chunks(PAGE_SIZE) {
            let mut qb: QueryBuilder<'_, Postgres> = QueryBuilder::new(
                "INSERT INTO cash_flows (symbol, fiscal_date_ending, reported_currency, \
                 operating_cashflow, payments_for_operating_activities, \
                 proceeds_from_operating_activities, change_in_operating_liabilities, \
                 change_in_operating_assets, depreciation_depletion_and_amortization, \
                 capital_expenditures, change_in_receivables, change_in_inventory, \
                 profit_loss, cashflow_from_investment, cashflow_from_financing, \
                 proceeds_from_repayments_of_short_term_debt, \
                 payments_for_repurchase_of_common_stock, payments_for_repurchase_of_equity, \
                 payments_for_repurchase_of_preferred_stock, dividend_payout, \
                 dividend_payout_common_stock, dividend_payout_preferred_stock, \
                 proceeds_from_issuance_of_common_stock, \
                 proceeds_from_issuance_of_long_term_debt_and_capital_securities, \
                 proceeds_from_issuance_of_preferred_stock, \
                 proceeds_from_repurchase_of_equity, proceeds_from_sale_of_treasury_stock, \
                 change_in_cash_and_cash_equivalents, change_in_exchange_rate, net_income, \
                 is_quarterly) ",
            );
            qb.push_values(page, |mut b, r| {
                b.push_bind(&r.symbol)
                    .push_bind(r.fiscal_date_ending)
                    .push_bind(&r.reported_currency)
                    .push_bind(r.operating_cashflow)
                    .push_bind(r.payments_for_operating_activities)
                    .push_bind(r.proceeds_from_operating_activities)
                    .push_bind(r.change_in_operating_liabilities)
                    .push_bind(r.change_in_operating_assets)
                    .push_bind(r.depreciation_depletion_and_amortization)
                    .push_bind(r.capital_expenditures)
                    .push_bind(r.change_in_receivables)
                    .push_bind(r.change_in_inventory)
                    .push_bind(r.profit_loss)
                    .push_bind(r.cashflow_from_investment)
                    .push_bind(r.cashflow_from_financing)
                    .push_bind(r.proceeds_from_repayments_of_short_term_debt)
                    .push_bind(r.payments_for_repurchase_of_common_stock)
                    .push_bind(r.payments_for_repurchase_of_equity)
                    .push_bind(r.payments_for_repurchase_of_preferred_stock)
                    .push_bind(r.dividend_payout)
                    .push_bind(r.dividend_payout_common_stock)
                    .push_bind(r.dividend_payout_preferred_stock)
                    .push_bind(r.proceeds_from_issuance_of_common_stock)
                    .push_bind(r.proceeds_from_issuance_of_long_term_debt_and_capital_securities)
                    .push_bind(r.proceeds_from_issuance_of_preferred_stock)
                    .push_bind(r.proceeds_from_repurchase_of_equity)
                    .push_bind(r.proceeds_from_sale_of_treasury_stock)
                    .push_bind(r.change_in_cash_and_cash_equivalents)
                    .push_bind(r.change_in_exchange_rate)
                    .push_bind(r.net_income)
                    .push_bind(r.is_quarterly);
            });
            push_conflict_update(
                &mut qb,
                "symbol, fiscal_date_ending, is_quarterly",
                UPDATE_COLUMNS,
                true,
            );
            qb.build()
                .execute(&mut *tx)
                .await
                .context("upsert cash_flows page")?;
        }
        tx.commit().await.context("commit cash_flows tx")?;

        info!(count = rows.len(), "upserted cash flow records");
        Ok(())
    }

    // -------------------------------------------------------------------------
    // news_articles (url) / news_stocks (news_id, symbol)
    // -------------------------------------------------------------------------

    /// Upsert news articles and return the `url -> id` map for link building.
    pub async fn upsert_news_articles(
        &self,
        rows: &[NewsArticle],
    ) -> Result<HashMap<String, i64>> {
        if rows.is_empty() {
            return Ok(HashMap::new());
        }

        const UPDATE_COLUMNS: &[&str] = &[
            "title",
            "time_published",
            "authors",
            "summary",
            "source",
            "category_within_source",
            "source_domain",
            "overall_sentiment_score",
            "overall_sentiment_label",
        ];

        let mut tx = self.pool.begin().await.context("begin news_articles tx")?;
        for page in rows.chunks(PAGE_SIZE) {
            let mut qb: QueryBuilder<'_, Postgres> = QueryBuilder::new(
                "INSERT INTO news_articles (title, url, time_published, authors, summary, \
                 source, category_within_source, source_domain, overall_sentiment_score, \
                 overall_sentiment_label) ",
            );
            qb.push_values(page, |mut b, r| {
                b.push_bind(&r.title)
                    .push_bind(&r.url)
                    .push_bind(r.time_published)
                    .push_bind(&r.authors)
                    .push_bind(&r.summary)
                    .push_bind(&r.source)
                    .push_bind(&r.category_within_source)
                    .push_bind(&r.source_domain)
                    .push_bind(r.overall_sentiment_score)
                    .push_bind(&r.overall_sentiment_label);
            });
            push_conflict_update(&mut qb, "url", UPDATE_COLUMNS, true);
            qb.build()
                .execute(&mut *tx)
                .await
                .context("upsert news_articles page")?;
        }

        let urls: Vec<String> = rows.iter().map(|r| r.url.clone()).collect();
        let ids: Vec<(i64, String)> =
            sqlx::query_as("SELECT id, url FROM news_articles WHERE url = ANY($1)")
                .bind(&urls)
                .fetch_all(&mut *tx)
                .await
                .context("fetch news article ids")?;

        tx.commit().await.context("commit news_articles tx")?;

        info!(count = rows.len(), "upserted news articles");
        Ok(ids.into_iter().map(|(id, url)| (url, id)).collect())
    }

    pub async fn upsert_news_stocks(&self, rows: &[NewsStockRow]) -> Result<()> {
        if rows.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await.context("begin news_stocks tx")?;
        for page in rows.chunks(PAGE_SIZE) {
            let mut qb: QueryBuilder<'_, Postgres> = QueryBuilder::new(
                "INSERT INTO news_stocks (news_id, symbol, relevance_score, sentiment_score, \
                 sentiment_label) ",
            );
            qb.push_values(page, |mut b, r| {
                b.push_bind(r.news_id)
                    .push_bind(&r.symbol)
                    .push_bind(r.relevance_score)
                    .push_bind(r.sentiment_score)
                    .push_bind(&r.sentiment_label);
            });
            push_conflict_update(
                &mut qb,
                "news_id, symbol",
                &["relevance_score", "sentiment_score", "sentiment_label"],
                false,
            );
            qb.build()
                .execute(&mut *tx)
                .await
                .context("upsert news_stocks page")?;
        }
        tx.commit().await.context("commit news_stocks tx")?;

        info!(count = rows.len(), "upserted news-stock links");
        Ok(())
    }
}
