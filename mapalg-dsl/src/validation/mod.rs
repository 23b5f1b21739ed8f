mod targets;

pub(crate) use targets::assigned_targets;
