use crate::command::{Command, ToArg};

pub fn pfadd(name: impl ToArg, values: impl IntoIterator<Item = impl ToArg>) -> Command {
    Command::new("PFADD").arg(name).args(values)
}

/// Approximate cardinality of the union of `names`.
pub fn pfcount(names: impl IntoIterator<Item = impl ToArg>) -> Command {
    Command::new("PFCOUNT").args(names)
}

pub fn pfmerge(dest: impl ToArg, sources: impl IntoIterator<Item = impl ToArg>) -> Command {
    Command::new("PFMERGE").arg(dest).args(sources)
}
