// crates/shared/src/macros.rs

/// Declares a toolbelt: a struct whose async methods are exposed as tools.
///
/// Each method must have the signature
/// `async fn name(&self, args: &serde_json::Map<String, serde_json::Value>) -> anyhow::Result<serde_json::Value>`.
/// Parameters are required unless followed by `(optional)`.
#[macro_export]
macro_rules! register_toolbelt {
    (
        $toolbelt_type:ty {
            description: $toolbelt_desc:literal,
            tools: {
                $(
                    $name:literal => $method:ident {
                        description: $desc:literal,
                        params: [$($param_name:literal: $param_type:literal => $param_desc:literal $(($opt:ident))?),* $(,)?]
                    }
                ),* $(,)?
            }
        }
    ) => {
        use $crate::once_cell::sync::Lazy;

        pub static TOOL_SCHEMAS: Lazy<Vec<$crate::schemas::ToolSchema>> = Lazy::new(|| vec![
            $(
                $crate::schemas::ToolSchema {
                    name: $name,
                    description: $desc,
                    parameters: vec![
                        $(
                            $crate::schemas::ParameterSchema {
                                name: $param_name,
                                param_type: $crate::schemas::ParamType::from_json_type($param_type),
                                description: $param_desc,
                                required: $crate::__param_required!($($opt)?),
                            }
                        ),*
                    ],
                }
            ),*
        ]);

        impl $toolbelt_type {
            /// One [`ToolSpec`]($crate::schemas::ToolSpec) per declared tool, sharing this instance.
            pub fn tool_specs(self: ::std::sync::Arc<Self>) -> Vec<$crate::schemas::ToolSpec> {
                let handlers: Vec<$crate::schemas::ToolHandler> = vec![
                    $(
                        {
                            let belt = ::std::sync::Arc::clone(&self);
                            $crate::schemas::handler_fn(move |args| {
                                let belt = ::std::sync::Arc::clone(&belt);
                                async move { belt.$method(&args).await }
                            })
                        }
                    ),*
                ];

                TOOL_SCHEMAS
                    .iter()
                    .cloned()
                    .zip(handlers)
                    .map(|(schema, handler)| $crate::schemas::ToolSpec::new(schema, handler))
                    .collect()
            }

            pub fn register_into(
                self: ::std::sync::Arc<Self>,
                registry: &mut $crate::registry::ToolRegistry,
            ) -> Result<(), $crate::errors::RegistryError> {
                registry.register_toolbelt($toolbelt_desc, self.tool_specs())
            }
        }
    };
}

#[doc(hidden)]
#[macro_export]
macro_rules! __param_required {
    () => {
        true
    };
    (optional) => {
        false
    };
}
