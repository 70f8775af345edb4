// src/commands/setup.rs
//! Environment commands: setup, unsetup
//!
//! Both print the resulting environment diff as neutral `set`/`unset`
//! lines; turning those into shell syntax is left to the caller.

use super::{open_session, setup_options};
use crate::cli::GlobalArgs;
use anyhow::Result;
use eups::{EnvironmentContext, Error, SetupOutcome, SetupReport};
use std::path::Path;
use tracing::warn;

pub fn cmd_setup(
    global: &GlobalArgs,
    product: &str,
    version: Option<&str>,
    root: Option<&Path>,
    just: bool,
    setup_type: Option<&str>,
) -> Result<()> {
    let eups = open_session(global)?;
    let mut env = EnvironmentContext::from_process();

    let mut options = setup_options(&eups).with_no_recursion(just);
    if let Some(setup_type) = setup_type {
        options = options.with_setup_type(setup_type);
    }

    let report = match root {
        Some(dir) => eups.setup_local(&mut env, product, dir, &options)?,
        None => eups.setup(&mut env, product, version, &options)?,
    };
    print_report(product, report)
}

pub fn cmd_unsetup(global: &GlobalArgs, product: &str, version: Option<&str>, just: bool) -> Result<()> {
    let eups = open_session(global)?;
    let mut env = EnvironmentContext::from_process();

    let options = setup_options(&eups).with_no_recursion(just);
    let report = eups.unsetup(&mut env, product, version, &options)?;
    print_report(product, report)
}

fn print_report(product: &str, report: SetupReport) -> Result<()> {
    for change in &report.changes {
        println!("{change}");
    }
    for failure in &report.failures {
        warn!("{} was not set up: {}", failure.product, failure.reason);
    }
    match report.outcome {
        SetupOutcome::Success(_) => Ok(()),
        SetupOutcome::Failure(reason) => Err(Error::SetupFailed {
            product: product.to_string(),
            reason,
        }
        .into()),
    }
}
