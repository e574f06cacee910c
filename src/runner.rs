use crate::evaluator::Evaluator;
use crate::lexer::Lexer;
use crate::parser::Parser;

/// Runs a source string through the whole pipeline. Parse errors are all
/// reported before giving up; otherwise the program's value (or the first
/// evaluation error) is the output.
pub fn run(source: &str, filename: Option<&str>) {
    let lexer = Lexer::new(source);
    let mut parser = Parser::new(lexer);
    let program = parser.parse_program();

    if !parser.errors.is_empty() {
        for error in &parser.errors {
            error.report(source, filename);
        }
        return;
    }

    let mut evaluator = Evaluator::new();
    match evaluator.eval_program(&program) {
        Ok(value) => println!("{}", value),
        Err(error) => error.report(source, filename),
    }
}
