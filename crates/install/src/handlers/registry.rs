//! Registry key and value operations against the configured store

use super::{invalid_arguments, unsupported, OperationHandler};
use crate::context::StepContext;
use async_trait::async_trait;
use updkit_errors::Error;
use updkit_types::{Operation, OperationMethod};

#[derive(Debug, Clone, Copy, Default)]
pub struct RegistryHandler;

#[async_trait]
impl OperationHandler for RegistryHandler {
    async fn execute(&self, step: &StepContext<'_>, operation: &Operation) -> Result<(), Error> {
        let store = &step.context.registry;
        let key = operation.target.trim_end_matches(['\\', '/']);

        match operation.method {
            OperationMethod::Create => {
                for sub_key in &operation.arguments {
                    store.create_key(&join_key(key, sub_key)).await?;
                }
            }
            OperationMethod::Delete => {
                for sub_key in &operation.arguments {
                    store.delete_key(&join_key(key, sub_key)).await?;
                }
            }
            OperationMethod::SetValue => {
                for pair in &operation.arguments {
                    let (name, value) = pair.split_once('=').ok_or_else(|| {
                        invalid_arguments(operation, format!("'{pair}' is not a name=value pair"))
                    })?;
                    store.set_value(key, name.trim(), value).await?;
                }
            }
            OperationMethod::DeleteValue => {
                for name in &operation.arguments {
                    store.delete_value(key, name).await?;
                }
            }
            _ => return Err(unsupported(operation)),
        }
        Ok(())
    }
}

fn join_key(parent: &str, sub_key: &str) -> String {
    format!("{parent}\\{}", sub_key.trim_matches(['\\', '/']))
}
