//! mysqldump parsing and rewriting

mod engine;
mod lexer;

pub use engine::{rewrite_dump, RewriteEngine, RewriteOutput, RewriteStats};
pub use lexer::{
    begin_table_definition, constraint_clause, end_table_definition, is_blank, is_data_line,
    strip_definer, ConstraintClause, TableHeader, TableTrailer,
};
