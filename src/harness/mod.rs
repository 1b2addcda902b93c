//! Harness generation - source text for one isolated execution unit.
//!
//! A harness is a standalone Node.js program. It evaluates the suite's setup
//! code in a fresh `vm` context, reads exactly one JSON request line from stdin,
//! answers with exactly one JSON line on stdout and exits.
//!
//! ```text
//! check:  stdin [test]              → stdout [test, elapsedMs] | [test, -1]
//! run:    stdin [test, durationMs]  → stdout count | -1
//! setup failure (either purpose)    → stdout {"setup_error": "..."}
//! ```
//!
//! User text (setup and test code) is embedded as JSON string literals and only
//! ever evaluated through `vm.runInContext`, so a syntax error anywhere in it is
//! caught and reported instead of breaking the harness itself.

use serde::{Deserialize, Serialize};
use std::fmt;

/// What the generated program does with the request it receives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Purpose {
    /// Execute the code once to see whether it throws.
    Check,
    /// Loop the code for a fixed duration and count iterations.
    Run,
}

impl fmt::Display for Purpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Purpose::Check => f.write_str("check"),
            Purpose::Run => f.write_str("run"),
        }
    }
}

/// Generated program text plus the purpose it was built for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Harness {
    purpose: Purpose,
    source: String,
}

impl Harness {
    pub fn purpose(&self) -> Purpose {
        self.purpose
    }

    pub fn source(&self) -> &str {
        &self.source
    }
}

const PRELUDE: &str = r#"const __vm = require("vm");
const __context = __vm.createContext({ console, performance });
const __reply = (value) => {
  process.stdout.write(JSON.stringify(value) + "\n", () => process.exit(0));
};
let __setupError = null;
try {
  __vm.runInContext(__BEFORE, __context, { filename: "before.js" });
} catch (e) {
  __setupError = String(e && e.stack ? e.stack : e);
}
"#;

const CHECK_HANDLER: &str = r#"const __handle = ([test]) => {
  try {
    const start = performance.now();
    __vm.runInContext(test.code, __context, { filename: "test.js" });
    __reply([test, performance.now() - start]);
  } catch (e) {
    __reply([test, -1]);
  }
};
"#;

const RUN_HANDLER: &str = r#"const __handle = ([test, duration]) => {
  let fn;
  try {
    fn = __vm.runInContext("(() => {\n" + test.code + "\n})", __context, { filename: "test.js" });
  } catch (e) {
    __reply(-1);
    return;
  }
  let ops = 0;
  try {
    const end = performance.now() + duration;
    while (performance.now() < end) {
      fn();
      ops++;
    }
  } catch (e) {
    __reply(-1);
    return;
  }
  __reply(ops);
};
"#;

const RECEIVER: &str = r#"let __input = "";
process.stdin.setEncoding("utf8");
process.stdin.on("data", (chunk) => {
  __input += chunk;
});
process.stdin.on("end", () => {
  if (__setupError !== null) {
    __reply({ setup_error: __setupError });
    return;
  }
  let message;
  try {
    message = JSON.parse(__input);
  } catch (e) {
    process.stderr.write("unreadable request: " + e + "\n");
    process.exit(2);
  }
  __handle(message);
});
"#;

/// Build the harness for `before` and `purpose`.
///
/// The text depends only on its inputs, so two calls with the same setup code
/// produce identical programs.
pub fn generate(before: &str, purpose: Purpose) -> Harness {
    // A JSON string literal is a valid JS string literal. U+2028/U+2029 are
    // escaped too because older engines reject them raw in string literals.
    let before_literal = serde_json::Value::String(before.to_string())
        .to_string()
        .replace('\u{2028}', "\\u2028")
        .replace('\u{2029}', "\\u2029");

    let handler = match purpose {
        Purpose::Check => CHECK_HANDLER,
        Purpose::Run => RUN_HANDLER,
    };

    let mut source = String::with_capacity(
        before_literal.len() + PRELUDE.len() + handler.len() + RECEIVER.len() + 32,
    );
    source.push_str(&format!("const __BEFORE = {before_literal};\n"));
    source.push_str(PRELUDE);
    source.push_str(handler);
    source.push_str(RECEIVER);

    tracing::trace!(%purpose, bytes = source.len(), "Generated harness");
    Harness { purpose, source }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_is_deterministic() {
        let a = generate("const data = [1, 2, 3]", Purpose::Run);
        let b = generate("const data = [1, 2, 3]", Purpose::Run);
        assert_eq!(a, b);
        assert_eq!(a.purpose(), Purpose::Run);
    }

    #[test]
    fn test_purposes_differ() {
        let check = generate("", Purpose::Check);
        let run = generate("", Purpose::Run);
        assert_ne!(check.source(), run.source());
        assert!(check.source().contains("__reply([test, -1])"));
        assert!(run.source().contains("while (performance.now() < end)"));
    }

    #[test]
    fn test_setup_is_embedded_as_literal() {
        let before = "const s = \"quoted\";\n// \u{2028} line sep\nthrow new Error('x')";
        let harness = generate(before, Purpose::Check);
        let first_line = harness.source().lines().next().unwrap();

        assert!(first_line.starts_with("const __BEFORE = \""));
        assert!(!harness.source().contains('\u{2028}'));
        // Raw setup text never appears outside the literal.
        assert!(!harness.source().contains("throw new Error('x')\n"));

        let literal = first_line
            .trim_start_matches("const __BEFORE = ")
            .trim_end_matches(';');
        let parsed: String = serde_json::from_str(literal).unwrap();
        assert_eq!(parsed, before);
    }

    #[test]
    fn test_setup_runs_before_handler() {
        let harness = generate("let x = 1", Purpose::Run);
        let src = harness.source();
        let setup = src.find("__vm.runInContext(__BEFORE").unwrap();
        let handler = src.find("const __handle").unwrap();
        let receive = src.find("process.stdin.on(\"end\"").unwrap();
        assert!(setup < handler && handler < receive);
    }
}
