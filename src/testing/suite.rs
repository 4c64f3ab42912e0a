//! Built-in ketch suite
//!
//! One ordered pipeline: frameworks are created and confirmed by `list`
//! before anything is deployed into them, the app is deployed before its
//! runtime state is inspected, inspection comes before stop/start, and all
//! removals run last as retried best-effort teardown.

use super::config::{ExpectSpec, StepAction, StepMode, TestScenario, TestStep, UntilSpec};

const FRAMEWORK_LIST_HEADER: &str = "NAME[ \t]+STATUS[ \t]+NAMESPACE[ \t]+INGRESS TYPE[ \t]+INGRESS CLASS NAME[ \t]+CLUSTER ISSUER[ \t]+APPS";
const APP_INFO_HEADER: &str =
    "DEPLOYMENT VERSION[ \t]+IMAGE[ \t]+PROCESS NAME[ \t]+WEIGHT[ \t]+STATE[ \t]+CMD";

/// The full ketch scenario, from `help` to framework removal
pub fn ketch_suite() -> TestScenario {
    let steps = vec![
        run("help", &["help"])
            .expect(
                ExpectSpec::ok()
                    .contains("For details see https://theketch.io")
                    .contains("Available Commands")
                    .contains("Flags"),
            ),
        // Frameworks
        run(
            "framework-add-cli",
            &[
                "framework",
                "add",
                "${framework_cli}",
                "--ingress-service-endpoint",
                "${endpoint}",
                "--ingress-type",
                "traefik",
            ],
        )
        .expect(ExpectSpec::ok().contains("Successfully added!")),
        run("framework-list", &["framework", "list"]).expect(
            ExpectSpec::ok()
                .matches(FRAMEWORK_LIST_HEADER)
                .matches(&framework_row("framework_cli")),
        ),
        write_file("framework-add-file", "framework_add_file", &framework_file(1)),
        run("framework-add-yaml", &["framework", "add", "${framework_add_file}"])
            .expect(ExpectSpec::ok().contains("Successfully added!")),
        run("framework-list-yaml", &["framework", "list"])
            .expect(ExpectSpec::ok().matches(&framework_row("framework_yaml"))),
        run(
            "framework-update-cli",
            &["framework", "update", "${framework_cli}", "--app-quota-limit", "2"],
        )
        .expect(ExpectSpec::ok().contains("Successfully updated!")),
        write_file(
            "framework-update-file",
            "framework_update_file",
            &framework_file(2),
        ),
        run(
            "framework-update-yaml",
            &["framework", "update", "${framework_update_file}"],
        )
        .expect(ExpectSpec::ok().contains("Successfully updated!")),
        run("framework-export", &["framework", "export", "${framework_cli}"]).expect(
            ExpectSpec::ok().matches(
                "appQuotaLimit: 2\ningressController:\n  className: traefik\n  serviceEndpoint: '*${endpoint}'*\n  type: traefik\nname: ${framework_cli}\nnamespace: ketch-${framework_cli}",
            ),
        ),
        // Apps
        run(
            "app-deploy",
            &[
                "app",
                "deploy",
                "${app}",
                "--framework",
                "${framework_cli}",
                "-i",
                "${app_image}",
            ],
        )
        .expect(ExpectSpec::ok().equals("")),
        poll("app-running", &["app", "info", "${app}"], UntilSpec::contains("running"), 20, 5),
        run("app-info", &["app", "info", "${app}"]).expect(
            ExpectSpec::ok()
                .matches(APP_INFO_HEADER)
                .matches("1[ \t]+${app_image}[ \t]+web[ \t]+100%[ \t]+[0-9] running[ \t]"),
        ),
        run("app-stop", &["app", "stop", "${app}"])
            .expect(ExpectSpec::ok().equals("Successfully stopped!\n")),
        run("app-start", &["app", "start", "${app}"])
            .expect(ExpectSpec::ok().equals("Successfully started!\n")),
        run("app-log", &["app", "log", "${app}"]).expect(ExpectSpec::ok()),
        run("builder-list", &["builder", "list"]).expect(
            ExpectSpec::ok()
                .matches("VENDOR[ \t]+IMAGE[ \t]+DESCRIPTION")
                .matches("Google[ \t]+gcr.io/buildpacks/builder:v1[ \t]+GCP Builder for all runtimes"),
        ),
        run("cname-add", &["cname", "add", "${cname}", "--app", "${app}"])
            .expect(ExpectSpec::ok()),
        run("cname-info", &["app", "info", "${app}"])
            .expect(ExpectSpec::ok().matches("Address: http://${cname}")),
        // Environment variables
        run(
            "env-set",
            &["env", "set", "${env_key}=${env_value}", "--app", "${app}"],
        )
        .expect(ExpectSpec::ok()),
        run("env-get", &["env", "get", "${env_key}", "--app", "${app}"])
            .expect(ExpectSpec::ok().contains("${env_value}")),
        run("env-unset", &["env", "unset", "${env_key}", "--app", "${app}"])
            .expect(ExpectSpec::ok()),
        run("env-get-unset", &["env", "get", "${env_key}", "--app", "${app}"])
            .expect(ExpectSpec::ok().not_contains("${env_value}")),
        // Teardown
        poll(
            "app-remove",
            &["app", "remove", "${app}"],
            UntilSpec::matches("(?i)successfully removed!"),
            3,
            3,
        )
        .teardown_of("app-deploy"),
        poll("app-gone", &["app", "info", "${app}"], UntilSpec::contains("not found"), 4, 4)
            .teardown_of("app-deploy"),
        // framework remove is rejected while the app is still terminating
        poll(
            "framework-remove-cli",
            &["framework", "remove", "${framework_cli}"],
            UntilSpec::contains("Framework successfully removed!"),
            3,
            3,
        )
        .stdin("ketch-${framework_cli}")
        .teardown_of("framework-add-cli"),
        poll(
            "framework-remove-yaml",
            &["framework", "remove", "${framework_yaml}"],
            UntilSpec::contains("Framework successfully removed!"),
            3,
            3,
        )
        .stdin("ketch-${framework_yaml}")
        .teardown_of("framework-add-yaml"),
    ];

    TestScenario {
        name: "ketch".to_string(),
        description: Some(
            "Framework, app, cname and env lifecycle against a live cluster".to_string(),
        ),
        vars: Default::default(),
        steps,
    }
}

/// Framework file for the file-driven add/update variants
fn framework_file(app_quota_limit: u32) -> String {
    format!(
        "name: ${{framework_yaml}}\n\
         app-quota-limit: {app_quota_limit}\n\
         ingressController:\n \
         className: traefik\n \
         serviceEndpoint: ${{endpoint}}\n \
         type: traefik"
    )
}

fn framework_row(var: &str) -> String {
    format!("${{{var}}}[ \t]+[Created \t]+ketch-${{{var}}}[ \t]+traefik[ \t]+traefik")
}

fn run(name: &str, args: &[&str]) -> TestStep {
    step(
        name,
        StepAction::Run {
            args: strings(args),
            stdin: None,
            expect: ExpectSpec::default(),
        },
    )
}

fn poll(name: &str, args: &[&str], until: UntilSpec, attempts: u32, delay_secs: u64) -> TestStep {
    step(
        name,
        StepAction::Poll {
            args: strings(args),
            stdin: None,
            until,
            attempts,
            delay_secs,
        },
    )
}

fn write_file(name: &str, var: &str, contents: &str) -> TestStep {
    step(
        name,
        StepAction::WriteFile {
            var: var.to_string(),
            suffix: ".yaml".to_string(),
            contents: contents.to_string(),
        },
    )
}

fn step(name: &str, action: StepAction) -> TestStep {
    TestStep {
        name: name.to_string(),
        mode: StepMode::Critical,
        cleans_up: None,
        action,
    }
}

fn strings(args: &[&str]) -> Vec<String> {
    args.iter().map(|s| s.to_string()).collect()
}

impl TestStep {
    fn expect(mut self, spec: ExpectSpec) -> Self {
        if let StepAction::Run { expect, .. } = &mut self.action {
            *expect = spec;
        }
        self
    }

    fn stdin(mut self, payload: &str) -> Self {
        if let StepAction::Run { stdin, .. } | StepAction::Poll { stdin, .. } = &mut self.action {
            *stdin = Some(payload.to_string());
        }
        self
    }
}
