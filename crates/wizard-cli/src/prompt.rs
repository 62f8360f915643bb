//! Interactive flow for the setup command.
//!
//! Collects the custom setup form when `-i` is passed. Values given as
//! flags skip their prompt.

use std::io::{self, Write};

use anyhow::{Result, bail};
use chrono::NaiveDateTime;
use console::style;
use dialoguer::{Confirm, Input, MultiSelect, Select, theme::ColorfulTheme};

use wizard_core::session::{GranularityUnit, SetupForm};

/// Login providers offered by the account backend.
pub const AUTH_METHODS: [&str; 5] = ["pure_cloud", "microsoft", "google", "salesforce", "okta"];

const SYNC_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M";

/// Pre-filled values from CLI args that skip prompts.
#[derive(Debug, Clone, Default)]
pub struct PrefilledSetup {
    pub primary_auth_method: Option<String>,
    pub secondary_auth_methods: Option<Vec<String>>,
    pub sync_time: Option<NaiveDateTime>,
    pub fetch_interval: Option<u32>,
    pub granularity: Option<(u32, GranularityUnit)>,
    /// Skip the confirmation
    pub yes: bool,
}

impl PrefilledSetup {
    /// Fill the form from flags alone, using defaults for the rest.
    pub fn into_form(self) -> SetupForm {
        let defaults = SetupForm::default();
        let (granularity_value, granularity_unit) = self
            .granularity
            .unwrap_or((defaults.granularity_value, defaults.granularity_unit));
        SetupForm {
            primary_auth_method: self
                .primary_auth_method
                .unwrap_or(defaults.primary_auth_method),
            secondary_auth_methods: self
                .secondary_auth_methods
                .unwrap_or(defaults.secondary_auth_methods),
            sync_time: self.sync_time.unwrap_or(defaults.sync_time),
            fetch_interval: self.fetch_interval.unwrap_or(defaults.fetch_interval),
            granularity_value,
            granularity_unit,
        }
    }
}

/// Result of interactive flow.
#[derive(Debug, Clone)]
pub struct SetupResult {
    pub form: SetupForm,
    pub confirmed: bool,
}

pub struct SetupFlow<W: Write = io::Stdout> {
    prefilled: PrefilledSetup,
    writer: W,
    theme: ColorfulTheme,
}

impl SetupFlow<io::Stdout> {
    pub fn new(prefilled: PrefilledSetup) -> Self {
        Self {
            prefilled,
            writer: io::stdout(),
            theme: ColorfulTheme::default(),
        }
    }
}

impl<W: Write> SetupFlow<W> {
    #[cfg(test)]
    pub fn with_writer(prefilled: PrefilledSetup, writer: W) -> Self {
        Self {
            prefilled,
            writer,
            theme: ColorfulTheme::default(),
        }
    }

    /// Flow:
    /// 1. Primary login provider
    /// 2. Secondary login providers
    /// 3. Sync start, fetch interval, granularity
    /// 4. Summary and confirm
    pub fn collect(&mut self) -> Result<SetupResult> {
        self.print_header()?;

        let primary = self.prompt_primary()?;
        let secondary = self.prompt_secondary(&primary)?;
        let defaults = SetupForm::default();
        let sync_time = self.prompt_sync_time(defaults.sync_time)?;
        let fetch_interval = self.prompt_fetch_interval(defaults.fetch_interval)?;
        let (granularity_value, granularity_unit) = self.prompt_granularity()?;

        let form = SetupForm {
            primary_auth_method: primary,
            secondary_auth_methods: secondary,
            sync_time,
            fetch_interval,
            granularity_value,
            granularity_unit,
        };

        let confirmed = self.show_summary_and_confirm(&form)?;
        Ok(SetupResult { form, confirmed })
    }

    fn print_header(&mut self) -> Result<()> {
        writeln!(self.writer)?;
        writeln!(
            self.writer,
            "{}",
            style("  Premium App Account Setup").bold().cyan()
        )?;
        writeln!(self.writer)?;
        Ok(())
    }

    fn prompt_primary(&self) -> Result<String> {
        if let Some(primary) = &self.prefilled.primary_auth_method {
            return Ok(primary.clone());
        }

        let selection = Select::with_theme(&self.theme)
            .with_prompt("Primary login provider")
            .items(&AUTH_METHODS)
            .default(0)
            .interact()?;
        Ok(AUTH_METHODS[selection].to_string())
    }

    fn prompt_secondary(&self, primary: &str) -> Result<Vec<String>> {
        if let Some(secondary) = &self.prefilled.secondary_auth_methods {
            return Ok(secondary.clone());
        }

        // The primary provider cannot also be secondary.
        let choices: Vec<&str> = AUTH_METHODS
            .iter()
            .copied()
            .filter(|method| !method.eq_ignore_ascii_case(primary))
            .collect();

        let selections = MultiSelect::with_theme(&self.theme)
            .with_prompt("Secondary login providers (space to toggle, enter to confirm)")
            .items(&choices)
            .interact()?;
        Ok(selections
            .iter()
            .map(|&i| choices[i].to_string())
            .collect())
    }

    fn prompt_sync_time(&self, default: NaiveDateTime) -> Result<NaiveDateTime> {
        if let Some(sync_time) = self.prefilled.sync_time {
            return Ok(sync_time);
        }

        let raw: String = Input::with_theme(&self.theme)
            .with_prompt("Sync data from (YYYY-MM-DDTHH:MM)")
            .default(default.format(SYNC_TIME_FORMAT).to_string())
            .validate_with(|input: &String| parse_sync_time(input).map(|_| ()))
            .interact_text()?;
        parse_sync_time(&raw).map_err(anyhow::Error::msg)
    }

    fn prompt_fetch_interval(&self, default: u32) -> Result<u32> {
        if let Some(interval) = self.prefilled.fetch_interval {
            return Ok(interval);
        }

        let interval: u32 = Input::with_theme(&self.theme)
            .with_prompt("Fetch interval (minutes)")
            .default(default)
            .interact_text()?;
        Ok(interval)
    }

    fn prompt_granularity(&self) -> Result<(u32, GranularityUnit)> {
        if let Some(granularity) = self.prefilled.granularity {
            return Ok(granularity);
        }

        let value: u32 = Input::with_theme(&self.theme)
            .with_prompt("Granularity")
            .default(12)
            .interact_text()?;
        let units = ["Hours", "Minutes"];
        let unit = match Select::with_theme(&self.theme)
            .with_prompt("Granularity unit")
            .items(&units)
            .default(0)
            .interact()?
        {
            0 => GranularityUnit::Hours,
            _ => GranularityUnit::Minutes,
        };
        Ok((value, unit))
    }

    fn show_summary_and_confirm(&mut self, form: &SetupForm) -> Result<bool> {
        writeln!(self.writer)?;
        writeln!(self.writer, "{}", style("  Summary").bold())?;
        writeln!(self.writer, "  ───────────────────────────")?;
        writeln!(
            self.writer,
            "  Primary:     {}",
            style(&form.primary_auth_method).green()
        )?;
        if !form.secondary_auth_methods.is_empty() {
            writeln!(
                self.writer,
                "  Secondary:   {}",
                style(form.secondary_auth_methods.join(", ")).green()
            )?;
        }
        writeln!(
            self.writer,
            "  Sync from:   {}",
            style(form.sync_time.format(SYNC_TIME_FORMAT)).green()
        )?;
        writeln!(
            self.writer,
            "  Fetch every: {}",
            style(format!("{} min", form.fetch_interval)).green()
        )?;
        writeln!(
            self.writer,
            "  Granularity: {}",
            style(form.granularity()).green()
        )?;
        writeln!(self.writer)?;

        if self.prefilled.yes {
            return Ok(true);
        }

        let confirmed = Confirm::with_theme(&self.theme)
            .with_prompt("Create the account?")
            .default(true)
            .interact()?;
        Ok(confirmed)
    }
}

pub fn parse_sync_time(input: &str) -> Result<NaiveDateTime, String> {
    NaiveDateTime::parse_from_str(input.trim(), SYNC_TIME_FORMAT)
        .map_err(|err| format!("expected YYYY-MM-DDTHH:MM: {err}"))
}

/// Parse `12H` or `30M`.
pub fn parse_granularity(input: &str) -> Result<(u32, GranularityUnit)> {
    let input = input.trim();
    let split = input
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(input.len());
    let (value, unit) = input.split_at(split);

    let Ok(value) = value.parse::<u32>() else {
        bail!("granularity must start with a number, got '{input}'");
    };
    let Some(unit) = GranularityUnit::from_designator(unit) else {
        bail!("granularity unit must be H or M, got '{input}'");
    };
    Ok((value, unit))
}
