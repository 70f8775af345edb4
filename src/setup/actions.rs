// src/setup/actions.rs

//! Running table actions against the environment

use crate::error::Result;
use crate::product::Product;
use crate::setup::{Direction, SetupContext, SetupEngine};
use crate::table::{self, Action, interpolate};

impl Action {
    /// Apply (or, unsetting up, revert) this action for `product`
    ///
    /// `depth` is the level any dependency named here would be set up at.
    pub fn execute(
        &self,
        engine: &SetupEngine<'_>,
        ctx: &mut SetupContext<'_>,
        product: &Product,
        depth: usize,
        direction: Direction,
        no_recursion: bool,
    ) -> Result<()> {
        let forward = direction == Direction::Setup;

        match self {
            Action::SetupRequired { product: dep, version } => engine.setup_dependency(
                ctx,
                dep,
                version.as_deref(),
                false,
                depth,
                direction,
                no_recursion,
            ),
            Action::SetupOptional { product: dep, version } => engine.setup_dependency(
                ctx,
                dep,
                version.as_deref(),
                true,
                depth,
                direction,
                no_recursion,
            ),
            Action::EnvSet { name, value } => {
                if forward {
                    let value = interpolate(value, product, ctx.env());
                    ctx.env.set(name, value);
                } else {
                    ctx.env.unset(name);
                }
                Ok(())
            }
            Action::EnvUnset { name } => {
                if forward {
                    ctx.env.unset(name);
                }
                Ok(())
            }
            Action::EnvPrepend { name, value, delimiter } => {
                let value = interpolate(value, product, ctx.env());
                if forward {
                    ctx.env.prepend(name, &value, delimiter);
                } else {
                    ctx.env.remove_from_list(name, &value, delimiter);
                }
                Ok(())
            }
            Action::EnvAppend { name, value, delimiter } => {
                let value = interpolate(value, product, ctx.env());
                if forward {
                    ctx.env.append(name, &value, delimiter);
                } else {
                    ctx.env.remove_from_list(name, &value, delimiter);
                }
                Ok(())
            }
            Action::AliasSet { name, value } => {
                if forward {
                    let value = interpolate(value, product, ctx.env());
                    ctx.env.set_alias(name, value);
                } else {
                    ctx.env.unset_alias(name);
                }
                Ok(())
            }
            Action::AliasUnset { name } => {
                if forward {
                    ctx.env.unset_alias(name);
                }
                Ok(())
            }
            Action::Conditional { when, then, otherwise } => {
                let flavor = engine.flavor();
                let setup_type = engine.options().setup_type.as_deref();
                let branch = if when.holds(flavor, setup_type, ctx.env()) {
                    then
                } else {
                    otherwise
                };

                for action in table::select(branch, flavor, setup_type) {
                    action.execute(engine, ctx, product, depth, direction, no_recursion)?;
                }
                Ok(())
            }
        }
    }
}
