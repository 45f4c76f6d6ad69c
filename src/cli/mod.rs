//! # CLI Module
//!
//! Command-line front end for checking requests and responses against a
//! contract, handy in CI and when debugging a contract.
//!
//! ## Commands
//!
//! ### `routes`
//!
//! ```bash
//! brrtguard routes --spec openapi.yaml
//! ```
//!
//! ### `request`
//!
//! ```bash
//! brrtguard request --spec openapi.yaml --method POST --url '/pets?dry_run=true' \
//!     --content-type application/json --data '{"name": "rex"}'
//! ```
//!
//! Options:
//! - `-H, --header <NAME: VALUE>` - add a request header (repeatable)
//! - `--body <FILE>` - read the JSON body from a file, `-` for stdin
//! - `--allow-unknown-query` - accept undeclared query parameters
//!
//! ### `response`
//!
//! ```bash
//! brrtguard response --spec openapi.yaml --url /pets/1 --status 200 --body pet.json
//! ```
//!
//! Both validating commands print a JSON report and exit non-zero when the
//! message violates the contract.

mod commands;


pub use commands::{run_cli, Cli, Commands};
