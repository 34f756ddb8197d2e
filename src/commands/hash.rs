//! # Hash Command Implementation
//!
//! Prints the content digest of a form: the hex SHA-256 of its canonical
//! JSON. This is the identifier registries publish forms under and the value
//! cycle detection compares.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;

use form_resolver::digest;

/// Print the content digest of a form
#[derive(Args, Debug)]
pub struct HashArgs {
    /// Form to hash, as a JSON file, or `-` for stdin.
    #[arg(value_name = "FORM")]
    pub form: PathBuf,
}

/// Execute the `hash` command.
pub fn execute(args: HashArgs) -> Result<()> {
    let form = super::read_form(&args.form)?;
    println!("{}", digest::hash(&form)?);
    Ok(())
}
