///
/// Command registry: the fixed name -> handler table, built once per run.
///

use indexmap::IndexMap;

use super::Command;
use crate::exec::BufferMode;

#[derive(Debug, Clone)]
pub struct CommandRegistry {
    commands: IndexMap<&'static str, Command>,
}

impl CommandRegistry {
    pub fn standard() -> Self {
        let commands = IndexMap::from([
            ("close", Command::Close),
            ("column-names", Command::ColumnNames),
            ("db", Command::Db),
            ("glob", Command::Glob { negate: false }),
            ("json", Command::Result { buffer: BufferMode::AsIs }),
            ("json-block", Command::TableResult { json: true }),
            ("new", Command::Open { create: true }),
            ("notglob", Command::Glob { negate: true }),
            ("null", Command::Null),
            ("oom", Command::Noop),
            ("open", Command::Open { create: false }),
            ("print", Command::Print),
            ("result", Command::Result { buffer: BufferMode::Escaped }),
            ("run", Command::Run),
            ("tableresult", Command::TableResult { json: false }),
            ("testcase", Command::TestCase),
            ("verbosity", Command::Verbosity),
        ]);
        Self { commands }
    }

    pub fn get(&self, name: &str) -> Option<Command> {
        self.commands.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.commands.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, Command)> + '_ {
        self.commands.iter().map(|(name, command)| (*name, *command))
    }
}

impl Default for CommandRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::Arity;

    #[test]
    fn test_standard_registry() {
        let registry = CommandRegistry::standard();
        assert_eq!(registry.len(), 17);
        assert!(registry.contains("tableresult"));
        assert!(registry.contains("json-block"));
        assert!(!registry.contains("end"));
        assert!(!registry.contains("nope"));
    }

    #[test]
    fn test_registered_arities() {
        let registry = CommandRegistry::standard();
        let arity = |name: &str| registry.get(name).map(|c| c.arity());
        assert_eq!(arity("open"), Some(Arity::exactly(1)));
        assert_eq!(arity("close"), Some(Arity::range(0, 1)));
        assert_eq!(arity("glob"), Some(Arity::at_least(1)));
        assert_eq!(arity("result"), Some(Arity::at_least(0)));
        assert_eq!(arity("tableresult"), Some(Arity::exactly(0)));
    }

    #[test]
    fn test_parameterized_handlers() {
        let registry = CommandRegistry::standard();
        assert_eq!(registry.get("new"), Some(Command::Open { create: true }));
        assert_eq!(registry.get("notglob"), Some(Command::Glob { negate: true }));
        assert_eq!(
            registry.get("json"),
            Some(Command::Result { buffer: BufferMode::AsIs })
        );
    }
}
