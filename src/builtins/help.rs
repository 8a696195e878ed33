//! `help` built-in, grounded on `stdlib/help.go`: with no arguments, prints
//! the quick-reference summary of every registered built-in; with one
//! STRING argument, prints that built-in's full entry from the
//! `crate::help` registry.

use super::{def, split_args, string_arg};
use crate::env::Environment;
use crate::value::Value;
use std::io::Write;
use std::rc::Rc;
use std::sync::Arc;

pub fn register(env: &Rc<Environment>) {
    env.define("help".to_string(), help());
}

fn help() -> Value {
    def("help", vec![], |scope, args| {
        let (_, positional) = split_args(args);
        let stdout = Arc::clone(&scope.env.streams().stdout);
        match positional.first() {
            None => Ok(Box::new(move || {
                let text = crate::help::format_quick_reference();
                let _ = stdout.lock().unwrap().write_all(text.as_bytes());
                Value::Null
            })),
            Some(arg) => {
                let name = string_arg(arg, "help")?;
                Ok(Box::new(move || match crate::help::get_help(&name) {
                    Some(entry) => {
                        let text = crate::help::format_help_entry(&entry);
                        let _ = stdout.lock().unwrap().write_all(text.as_bytes());
                        Value::Null
                    }
                    None => Value::Error(format!("no help entry for {}", name)),
                }))
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipes::Scope;

    #[test]
    fn help_with_unknown_name_is_an_error_value() {
        crate::help::populate_builtin_help();
        let env = Environment::new();
        let scope = Scope::new(env);
        let Value::Builtin(b) = help() else { panic!() };
        let result = (b.prepare)(&scope, &[Value::String("nonexistent_builtin".into())]).unwrap()();
        assert!(matches!(result, Value::Error(_)));
    }

    #[test]
    fn help_with_known_name_succeeds() {
        crate::help::populate_builtin_help();
        let env = Environment::new();
        let scope = Scope::new(env);
        let Value::Builtin(b) = help() else { panic!() };
        let result = (b.prepare)(&scope, &[Value::String("echo".into())]).unwrap()();
        assert!(matches!(result, Value::Null));
    }
}
