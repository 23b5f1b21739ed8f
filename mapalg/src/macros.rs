/// Declares a closed engine enumeration with its ABI code and display name.
macro_rules! code_enum {
    (
        $(#[$meta:meta])*
        $name:ident {
            $($variant:ident = $code:literal => $text:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn code(self) -> i32 {
                match self {
                    $($name::$variant => $code),+
                }
            }

            pub fn from_code(code: i32) -> anyhow::Result<Self> {
                match code {
                    $($code => Ok($name::$variant),)+
                    other => Err($crate::error::MapError::type_mismatch(format!(
                        "unknown {} code {}",
                        stringify!($name),
                        other
                    ))),
                }
            }

            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = anyhow::Error;

            fn from_str(value: &str) -> anyhow::Result<Self> {
                match value {
                    $($text => Ok($name::$variant),)+
                    other => Err(anyhow::anyhow!(
                        "unknown {} '{}'",
                        stringify!($name),
                        other
                    )),
                }
            }
        }
    };
}

/// Builds a [`LoopVars`](crate::LoopVars) scope from `name: value` pairs.
///
/// ```ignore
/// let mut vars = loop_vars!({ counter: ctx.zeros(&RasterOptions::default())?, step: 1 });
/// ```
#[macro_export]
macro_rules! loop_vars {
    ({ $($name:ident : $value:expr),* $(,)? }) => {{
        let mut vars = $crate::LoopVars::new();
        $( vars.declare(stringify!($name), $value); )*
        vars
    }};
}

/// Moves rasters out of a [`LoopVars`](crate::LoopVars) scope into locals.
#[macro_export]
macro_rules! take_vars {
    ($vars:expr, { $($name:ident),* $(,)? }) => {
        $( let $name = $vars.take_raster(stringify!($name))?; )*
    };
}
