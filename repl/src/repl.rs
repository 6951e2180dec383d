use std::io::{self, Write};

use tally_core::error::Result;
use tally_core::{
    Evaluator, MapScope, NativeMethod, NativeRegistry, Simplifier, Type, Typer, Value,
};

pub struct Repl {
    evaluator: Evaluator,
    scope: MapScope,
    history: Vec<String>,
    line_number: usize,
}

impl Repl {
    pub fn new() -> Self {
        Self {
            evaluator: Evaluator::with_target(demo_registry()),
            scope: MapScope::new(),
            history: Vec::new(),
            line_number: 1,
        }
    }

    pub fn run(&mut self) -> io::Result<()> {
        println!("Tally expression REPL");
        println!("Type 'exit' to quit, 'help' for commands");

        loop {
            print!("tally[{}]> ", self.line_number);
            io::stdout().flush()?;

            let mut line = String::new();
            if io::stdin().read_line(&mut line)? == 0 {
                break;
            }
            let line = line.trim();

            if line.starts_with(':') {
                self.handle_command(line[1..].trim());
                continue;
            }

            match line {
                "exit" | "quit" => break,
                "help" => {
                    self.show_help();
                    continue;
                }
                "history" => {
                    self.show_history();
                    continue;
                }
                "clear" => {
                    print!("\x1B[2J\x1B[1;1H");
                    continue;
                }
                "" => continue,
                line => {
                    self.history.push(line.to_string());
                    self.line_number += 1;
                    match self.evaluate_source(line) {
                        Ok(value) => self.pretty_print_value(&value),
                        Err(e) => println!("\x1B[31m{}\x1B[0m", e),
                    }
                }
            }
        }

        println!("Goodbye!");
        Ok(())
    }

    /// Full pipeline: parse, type against the demo registry and the current
    /// scope, fold constants, evaluate.
    pub fn evaluate_source(&mut self, source: &str) -> Result<Value> {
        tracing::debug!(source, "evaluating input");
        let mut ast = tally_core::parse(source)?;
        Typer::new(self.evaluator.target())
            .with_scope(&self.scope)
            .type_ast(&mut ast)?;
        let ast = Simplifier::new(self.evaluator.target()).simplify(ast, &self.scope)?;
        self.evaluator.evaluate(&ast, &mut self.scope)
    }

    fn show_tree(&mut self, source: &str) {
        match tally_core::parse(source) {
            Ok(ast) => {
                println!("parsed:     {}", ast);
                match Simplifier::new(self.evaluator.target()).simplify(ast, &self.scope) {
                    Ok(folded) => println!("simplified: {}", folded),
                    Err(e) => println!("\x1B[31m{}\x1B[0m", e),
                }
            }
            Err(e) => println!("\x1B[31m{}\x1B[0m", e),
        }
    }

    fn pretty_print_value(&self, value: &Value) {
        match value {
            Value::Unit => println!("=> ()"),
            Value::Str(s) => println!("=> \x1B[32m'{}'\x1B[0m", s),
            Value::Bool(b) => println!("=> \x1B[35m{}\x1B[0m", b),
            number => println!("=> \x1B[33m{}\x1B[0m", number),
        }
    }

    fn show_help(&self) {
        println!("Available commands:");
        println!("  exit, quit - Exit the REPL");
        println!("  help       - Show this help message");
        println!("  history    - Show command history");
        println!("  clear      - Clear the screen");
        println!("Special commands (start with ':'):");
        println!("  :ast [expr]  - Show the parsed and simplified tree");
        println!("  :vars        - List scope variables");
    }

    fn show_history(&self) {
        println!("Command history:");
        for (i, cmd) in self.history.iter().enumerate() {
            println!("{}: {}", i + 1, cmd);
        }
    }

    fn handle_command(&mut self, cmd: &str) {
        let parts: Vec<&str> = cmd.splitn(2, ' ').collect();
        match parts[0] {
            "ast" => {
                if parts.len() < 2 {
                    println!("Usage: :ast expression");
                    return;
                }
                self.show_tree(parts[1]);
            }
            "vars" => {
                let mut entries: Vec<_> = self.scope.variables().collect();
                entries.sort_by_key(|(name, _)| name.to_string());
                if entries.is_empty() {
                    println!("(no variables; assign with 'name = expression')");
                }
                for (name, value) in entries {
                    println!("{} = {}", name, value);
                }
            }
            _ => println!("Unknown command: {}", cmd),
        }
    }
}

/// Methods available in REPL sessions.
fn demo_registry() -> NativeRegistry {
    let mut registry = NativeRegistry::new();
    registry.register(
        NativeMethod::new("len", vec![Type::Str], Type::I32, |args| {
            Ok(Value::I32(
                args[0].as_str().map(|s| s.len()).unwrap_or(0) as i32
            ))
        })
        .pure_fn(),
    );
    registry.register(
        NativeMethod::new("upper", vec![Type::Str], Type::Str, |args| {
            Ok(Value::Str(
                args[0].as_str().unwrap_or_default().to_uppercase(),
            ))
        })
        .pure_fn(),
    );
    registry.register(
        NativeMethod::new("max", vec![Type::F64], Type::F64, |args| {
            let mut best = f64::MIN;
            for arg in &args {
                if let Some(v) = arg.as_f64() {
                    best = best.max(v);
                }
            }
            Ok(Value::F64(best))
        })
        .varargs()
        .pure_fn(),
    );
    registry.register(NativeMethod::new("now", vec![], Type::I64, |_| {
        let millis = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_millis() as i64)
            .unwrap_or(0);
        Ok(Value::I64(millis))
    }));
    registry
}
