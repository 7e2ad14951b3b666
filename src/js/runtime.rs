use anyhow::{anyhow, Context as AnyhowContext, Result};
use rquickjs::context::EvalOptions;
use rquickjs::{Context, Ctx, Error as JsError, Function, Runtime, Value};

/// JavaScript runtime backed by QuickJS.
///
/// The engine owns the QuickJS runtime and context and provides helpers for evaluating
/// scripts. Page scripts are evaluated in sloppy mode so legacy constructs such as
/// `with` blocks keep working. A minimal `console` forwards to `tracing`.
pub struct QuickJsEngine {
    runtime: Runtime,
    context: Context,
}

const MAX_JOBS: usize = 1000;

impl QuickJsEngine {
    pub fn new() -> Result<Self> {
        let runtime = Runtime::new().context("failed to create QuickJS runtime")?;
        let context = Context::full(&runtime).context("failed to create QuickJS context")?;
        let engine = Self { runtime, context };
        engine.init_console()?;
        Ok(engine)
    }

    /// Evaluate a script and discard the result.
    pub fn eval(&self, source: &str, filename: &str) -> Result<()> {
        self.eval_with::<()>(source, filename)
    }

    /// Evaluate a script and convert the result into `V`.
    pub fn eval_with<V>(&self, source: &str, filename: &str) -> Result<V>
    where
        V: for<'js> rquickjs::FromJs<'js>,
    {
        let script = Self::with_source_url(source, filename);
        let value = self.context.with(|ctx| {
            let mut options = EvalOptions::default();
            options.strict = false;
            match ctx.eval_with_options::<V, _>(script, options) {
                Ok(value) => Ok(value),
                Err(JsError::Exception) => Err(anyhow!(exception_message(&ctx))),
                Err(err) => Err(anyhow::Error::from(err)),
            }
        });
        self.execute_pending_jobs();
        value
    }

    /// Run `f` inside the context, turning thrown exceptions into their message.
    pub fn with_context<T, F>(&self, f: F) -> Result<T>
    where
        F: for<'js> FnOnce(Ctx<'js>) -> rquickjs::Result<T>,
    {
        let value = self.context.with(|ctx| match f(ctx.clone()) {
            Ok(value) => Ok(value),
            Err(JsError::Exception) => Err(anyhow!(exception_message(&ctx))),
            Err(err) => Err(anyhow::Error::from(err)),
        });
        self.execute_pending_jobs();
        value
    }

    /// Force a collection cycle. Called after compiling throwaway handler closures.
    pub fn collect_garbage(&self) {
        self.runtime.run_gc();
    }

    /// Drain promise continuations, including timer callbacks queued as microtasks.
    fn execute_pending_jobs(&self) {
        let mut job_count = 0;

        while self.runtime.is_job_pending() {
            match self.runtime.execute_pending_job() {
                Ok(true) => {
                    job_count += 1;
                    if job_count >= MAX_JOBS {
                        tracing::warn!(
                            target: "quickjs",
                            "stopped processing jobs after {} iterations",
                            MAX_JOBS
                        );
                        break;
                    }
                }
                Ok(false) => break,
                Err(job_exception) => {
                    tracing::warn!(
                        target: "quickjs",
                        "job execution error: {:?}",
                        job_exception
                    );
                }
            }
        }

        if job_count > 0 {
            tracing::debug!(target: "quickjs", "executed {} pending jobs", job_count);
        }
    }

    fn init_console(&self) -> Result<()> {
        self.context
            .with(|ctx| {
                let global = ctx.globals();
                let log_fn = Function::new(ctx.clone(), log_from_js)?.with_name("__honey_log")?;
                global.set("__honey_log", log_fn)?;
                ctx.eval::<(), _>(CONSOLE_BOOTSTRAP.as_bytes())
            })
            .map_err(anyhow::Error::from)
    }

    fn with_source_url(source: &str, filename: &str) -> Vec<u8> {
        let mut script = String::with_capacity(source.len() + filename.len() + 32);
        script.push_str(source);
        if !source.ends_with('\n') {
            script.push('\n');
        }
        script.push_str("//# sourceURL=");
        script.push_str(filename);
        script.push('\n');
        script.into_bytes()
    }
}

fn log_from_js(message: String) -> rquickjs::Result<()> {
    tracing::info!(target: "quickjs", message = %message);
    Ok(())
}

fn exception_message(ctx: &Ctx<'_>) -> String {
    let exception: Value = ctx.catch();

    if let Some(obj) = exception.as_object() {
        if let Ok(message) = obj.get::<_, String>("message") {
            let name = obj
                .get::<_, String>("name")
                .unwrap_or_else(|_| "Error".to_string());
            return format!("{name}: {message}");
        }
    }
    if let Some(text) = exception.as_string().and_then(|text| text.to_string().ok()) {
        return text;
    }

    format!("{:?}", exception)
}

const CONSOLE_BOOTSTRAP: &str = r#"
(() => {
    const global = globalThis;
    const stringify = (value) => {
        try {
            if (typeof value === 'string') {
                return value;
            }
            if (value === undefined) {
                return 'undefined';
            }
            if (value === null) {
                return 'null';
            }
            return String(value);
        } catch (err) {
            return '[unprintable]';
        }
    };

    const logImpl = (...args) => {
        try {
            global.__honey_log(args.map(stringify).join(' '));
        } catch (err) {
        }
    };

    if (typeof global.console !== 'object' || global.console === null) {
        global.console = {};
    }

    global.console.log = logImpl;
    global.console.error = logImpl;
    global.console.warn = logImpl;
    global.console.info = logImpl;
    global.console.debug = logImpl;
})();
"#;
