use crate::money::Money;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Tunable constants for the whole simulation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimConstants {
    /// Real milliseconds that make up one game day.
    pub real_ms_per_game_day: i64,
    /// Game days per simulated year. One game day is one month.
    pub days_per_year: i64,
    pub annual_growth_rate: Decimal,
    pub annual_dividend_rate: Decimal,
    pub investment_asset: String,
    pub starting_cash: Money,
    pub initial_asset_price: Money,
    pub initial_mortgage_rate: Decimal,
    /// Days between acceptance of a mortgage and its first payment.
    pub repayment_period_days: i64,
    /// Length of a rent "month" in game days.
    pub rent_cycle_days: i64,
    /// Denominator for converting an annual salary into one pay period.
    pub payroll_days_basis: i64,
    /// Per-category, per-day probability that a spending category fires.
    pub spending_trigger_chance: f64,
    pub daily_withdrawal_limit: Money,
    pub min_term_years: u32,
    pub max_term_years: u32,
}

impl Default for SimConstants {
    fn default() -> Self {
        Self {
            real_ms_per_game_day: 60_000,
            days_per_year: 12,
            annual_growth_rate: Decimal::new(10, 2),
            annual_dividend_rate: Decimal::new(3, 2),
            investment_asset: "S&P 500".into(),
            starting_cash: Money::from_units(100_000),
            initial_asset_price: Money::from_units(4_500),
            initial_mortgage_rate: Decimal::new(5, 2),
            repayment_period_days: 1,
            rent_cycle_days: 30,
            payroll_days_basis: 365,
            spending_trigger_chance: 1.0 / 30.0,
            daily_withdrawal_limit: Money::from_units(500),
            min_term_years: 5,
            max_term_years: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobConfig {
    pub job_id: String,
    pub title: String,
    pub employer: String,
    pub annual_salary: Money,
    pub pay_cycle_days: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpendingCategoryConfig {
    pub category_id: String,
    pub name: String,
    /// Fractions of disposable income, e.g. 0.05 = 5%.
    pub min_pct_income: f64,
    pub max_pct_income: f64,
    #[serde(default)]
    pub variability: f64,
    pub default_active: bool,
}

#[derive(Debug, Clone, Deserialize)]
struct JobsFile {
    jobs: Vec<JobConfig>,
}

#[derive(Debug, Clone, Deserialize)]
struct SpendingCategoriesFile {
    categories: Vec<SpendingCategoryConfig>,
}

#[derive(Debug, Clone)]
pub struct SimConfig {
    pub constants: SimConstants,
    pub jobs: HashMap<String, JobConfig>,
    /// Catalog order is evaluation order.
    pub spending_categories: Vec<SpendingCategoryConfig>,
}

impl SimConfig {
    /// Load from the data/ directory.
    /// In tests, use SimConfig::default_test().
    pub fn load(data_dir: &str) -> anyhow::Result<Self> {
        let constants_path = format!("{data_dir}/sim/constants.json");
        let constants_content = std::fs::read_to_string(&constants_path)
            .map_err(|e| anyhow::anyhow!("Cannot read {constants_path}: {e}"))?;
        let constants: SimConstants = serde_json::from_str(&constants_content)?;

        let jobs_path = format!("{data_dir}/catalog/jobs.json");
        let jobs_content = std::fs::read_to_string(&jobs_path)
            .map_err(|e| anyhow::anyhow!("Cannot read {jobs_path}: {e}"))?;
        let jobs_file: JobsFile = serde_json::from_str(&jobs_content)?;
        let jobs = jobs_file
            .jobs
            .into_iter()
            .map(|j| (j.job_id.clone(), j))
            .collect();

        let spending_path = format!("{data_dir}/catalog/spending_categories.json");
        let spending_content = std::fs::read_to_string(&spending_path)
            .map_err(|e| anyhow::anyhow!("Cannot read {spending_path}: {e}"))?;
        let spending_file: SpendingCategoriesFile = serde_json::from_str(&spending_content)?;

        let config = Self {
            constants,
            jobs,
            spending_categories: spending_file.categories,
        };
        config.validate()?;
        Ok(config)
    }

    /// Config with hardcoded defaults for use in unit tests.
    pub fn default_test() -> Self {
        let jobs = [
            JobConfig {
                job_id: "barista".into(),
                title: "Barista".into(),
                employer: "Bean There".into(),
                annual_salary: Money::from_units(36_500),
                pay_cycle_days: 1,
            },
            JobConfig {
                job_id: "engineer".into(),
                title: "Software Engineer".into(),
                employer: "Alki Systems".into(),
                annual_salary: Money::from_units(120_000),
                pay_cycle_days: 2,
            },
        ]
        .into_iter()
        .map(|j| (j.job_id.clone(), j))
        .collect();

        let spending_categories = vec![
            SpendingCategoryConfig {
                category_id: "groceries".into(),
                name: "Groceries".into(),
                min_pct_income: 0.10,
                max_pct_income: 0.15,
                variability: 0.10,
                default_active: true,
            },
            SpendingCategoryConfig {
                category_id: "dining".into(),
                name: "Dining Out".into(),
                min_pct_income: 0.03,
                max_pct_income: 0.08,
                variability: 0.25,
                default_active: true,
            },
            SpendingCategoryConfig {
                category_id: "travel".into(),
                name: "Travel".into(),
                min_pct_income: 0.05,
                max_pct_income: 0.20,
                variability: 0.0,
                default_active: false,
            },
        ];

        Self {
            constants: SimConstants::default(),
            jobs,
            spending_categories,
        }
    }

    pub fn job(&self, job_id: &str) -> Option<&JobConfig> {
        self.jobs.get(job_id)
    }

    pub fn active_spending_categories(&self) -> impl Iterator<Item = &SpendingCategoryConfig> {
        self.spending_categories.iter().filter(|c| c.default_active)
    }

    fn validate(&self) -> anyhow::Result<()> {
        let c = &self.constants;
        anyhow::ensure!(c.real_ms_per_game_day > 0, "real_ms_per_game_day must be positive");
        anyhow::ensure!(c.days_per_year > 0, "days_per_year must be positive");
        anyhow::ensure!(c.rent_cycle_days > 0, "rent_cycle_days must be positive");
        anyhow::ensure!(c.payroll_days_basis > 0, "payroll_days_basis must be positive");
        anyhow::ensure!(
            c.min_term_years <= c.max_term_years,
            "min_term_years exceeds max_term_years"
        );
        for job in self.jobs.values() {
            anyhow::ensure!(job.annual_salary.is_positive(), "job {} has no salary", job.job_id);
            anyhow::ensure!(job.pay_cycle_days > 0, "job {} has no pay cycle", job.job_id);
        }
        for cat in &self.spending_categories {
            anyhow::ensure!(
                cat.min_pct_income <= cat.max_pct_income,
                "category {} has min above max",
                cat.category_id
            );
        }
        Ok(())
    }
}
