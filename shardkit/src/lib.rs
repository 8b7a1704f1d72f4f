//! Sharding route and SQL rewrite engine.
//!
//! Takes a bound statement (tables, predicates, and parameters already
//! resolved upstream) plus an immutable sharding rule, computes the
//! minimal correct set of physical targets, and rewrites the SQL text
//! and parameter list into one executable unit per target.
//!
//! ```
//! use shardkit::{config::Config, rule::ShardingRule};
//! use shardkit::statement::{BoundStatement, StatementKind, TableRef};
//! use shardkit::{shard, ShardRequest};
//!
//! let config = Config::from_str(
//!     r#"
//!     [[data_sources]]
//!     name = "ds_0"
//!
//!     [[data_sources]]
//!     name = "ds_1"
//!     "#,
//! )
//! .unwrap();
//! let rule = ShardingRule::new(&config).unwrap();
//!
//! let mut statement = BoundStatement::new("SELECT 1", StatementKind::Select);
//! statement.tables = vec![TableRef::new("t_plain")];
//!
//! let result = shard(&ShardRequest::new(&rule, &statement)).unwrap();
//! assert!(result.route.is_single_routing());
//! ```

pub mod config;
pub mod rewrite;
pub mod router;
pub mod rule;
pub mod statement;
pub mod stats;
pub mod util;

pub use rewrite::{ExecutionUnit, RewriteOutput, SqlRewriteEngine};
pub use router::{
    HintContext, RouteContext, RouteDecorator, RouteResult, RouteUnit, Router, UnicastCursor,
};
pub use rule::{RuleHolder, ShardingRule};
pub use statement::BoundStatement;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("{0}")]
    Config(#[from] config::Error),

    #[error("{0}")]
    Rule(#[from] rule::Error),

    #[error("{0}")]
    Router(#[from] router::Error),

    #[error("{0}")]
    Rewrite(#[from] rewrite::Error),
}

/// One statement execution: the rule snapshot, the statement, and the
/// per-execution context that goes with it.
pub struct ShardRequest<'a> {
    pub rule: &'a ShardingRule,
    pub statement: &'a BoundStatement,
    pub hint: Option<&'a HintContext>,
    /// Unicast pick for this logical execution. Without one, each call
    /// picks fresh.
    pub cursor: Option<&'a UnicastCursor>,
    pub decorators: &'a [Box<dyn RouteDecorator>],
}

impl<'a> ShardRequest<'a> {
    pub fn new(rule: &'a ShardingRule, statement: &'a BoundStatement) -> Self {
        Self {
            rule,
            statement,
            hint: None,
            cursor: None,
            decorators: &[],
        }
    }

    pub fn with_hint(mut self, hint: &'a HintContext) -> Self {
        self.hint = Some(hint);
        self
    }

    pub fn with_cursor(mut self, cursor: &'a UnicastCursor) -> Self {
        self.cursor = Some(cursor);
        self
    }

    pub fn with_decorators(mut self, decorators: &'a [Box<dyn RouteDecorator>]) -> Self {
        self.decorators = decorators;
        self
    }
}

/// Route result plus the executable units derived from it.
#[derive(Debug)]
pub struct ShardResult {
    pub route: RouteContext,
    pub output: RewriteOutput,
}

/// Route one statement and rewrite it per target: the whole kernel in
/// one call.
pub fn shard(request: &ShardRequest) -> Result<ShardResult, Error> {
    let router = Router::new(request.rule);
    let fresh = UnicastCursor::new();
    let cursor = request.cursor.unwrap_or(&fresh);
    let mut routed = router.route(request.statement, request.hint, cursor)?;

    router::decorator::apply(
        request.decorators,
        &mut routed.route,
        request.statement,
        request.rule,
    )?;

    let output = SqlRewriteEngine::new(request.rule, request.statement)
        .with_hint(request.hint)
        .rewrite(&routed)?;

    Ok(ShardResult {
        route: routed.route,
        output,
    })
}
