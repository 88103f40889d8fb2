//! # Ambient path scope
//!
//! §4.3 requires path composition to be ambient, not threaded as an argument, so handler code
//! reads like ordinary sequential code. §5 and §9 both call out `tokio::task_local!` (or an
//! equivalent mechanism tied to the logical call chain) as the implementation vehicle in runtimes
//! that have one; this module is that vehicle.
//!
//! A handler's top-level invocation establishes the scope once, rooted at the function id.
//! Every nested `execute` call re-scopes to its own `fullPath` for the duration of its callback,
//! then the scope reverts on return — exactly mirroring the nested-call-stack shape of the
//! handler's own source.

use tasker_shared::TaskPath;

tokio::task_local! {
    static CURRENT_PATH: TaskPath;
}

/// Run `fut` with `path` as the ambient current path, restoring the caller's scope on return.
pub async fn scoped<F, T>(path: TaskPath, fut: F) -> T
where
    F: std::future::Future<Output = T>,
{
    CURRENT_PATH.scope(path, fut).await
}

/// The ambient current path. Panics if called outside a scope established by [`scoped`]; every
/// `execute` call happens inside one, so this is only reachable from handler code running
/// entirely outside the engine, which is a programmer error.
pub fn current() -> TaskPath {
    CURRENT_PATH.with(|p| p.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn scope_establishes_current_path() {
        scoped(TaskPath::root("func1"), async {
            assert_eq!(current().as_str(), "func1");
        })
        .await;
    }

    #[tokio::test]
    async fn nested_scope_shadows_and_restores() {
        scoped(TaskPath::root("func1"), async {
            assert_eq!(current().as_str(), "func1");
            scoped(TaskPath::root("func1").child("step1"), async {
                assert_eq!(current().as_str(), "func1:step1");
            })
            .await;
            // Restored after the nested scope completes.
            assert_eq!(current().as_str(), "func1");
        })
        .await;
    }

    #[tokio::test]
    async fn scope_survives_await_points() {
        scoped(TaskPath::root("func1"), async {
            tokio::task::yield_now().await;
            assert_eq!(current().as_str(), "func1");
        })
        .await;
    }
}
