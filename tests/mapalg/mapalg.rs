#[path = "common/mod.rs"]
mod common;

#[path = "scalar/scalar_value.rs"]
mod scalar_value;
#[path = "scalar/scalar_shape.rs"]
mod scalar_shape;

#[path = "graph/graph_refcount.rs"]
mod graph_refcount;
#[path = "graph/graph_builder.rs"]
mod graph_builder;
#[path = "graph/graph_access.rs"]
mod graph_access;
#[path = "graph/graph_focal.rs"]
mod graph_focal;
#[path = "graph/graph_context.rs"]
mod graph_context;

#[path = "loops/loops_builder.rs"]
mod loops_builder;
#[path = "loops/loops_macro.rs"]
mod loops_macro;
#[path = "loops/loops_lowering.rs"]
mod loops_lowering;

#[path = "engine/engine_io.rs"]
mod engine_io;
#[path = "engine/engine_binding.rs"]
mod engine_binding;

#[path = "logging/logging_filter.rs"]
mod logging_filter;
