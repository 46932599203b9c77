//! End-to-end tests for group and member mutations against a real authority
//! repository.
//!
//! Each test provisions a bare authority repo and a working copy, drives
//! `AccessControlService`, and then inspects both the local file and the
//! remote's history.

use gatekeeper::ErrorKind;
use gatekeeper::core::config_store::parse;
use gatekeeper::io::settings::{ConfigProvider, GITOSIS_REPO_KEY, conf_path};
use gatekeeper::test_support::{SEED_CONF, TestAuthority};

fn local_doc(authority: &TestAuthority) -> gatekeeper::core::config_store::ConfigDocument {
    let bytes = std::fs::read(authority.conf_path()).expect("read local conf");
    parse(&bytes).expect("parse local conf")
}

#[test]
fn add_group_keeps_existing_sections() {
    let authority = TestAuthority::new().expect("authority");
    let service = authority.service().expect("service");

    service.add_group("someGroup").expect("first group");
    assert!(local_doc(&authority).has_section("group someGroup"));

    service.add_group("someOtherGroup").expect("second group");
    let doc = local_doc(&authority);
    assert!(doc.has_section("gitosis"));
    assert!(doc.has_section("group someGroup"));
    assert!(doc.has_section("group someOtherGroup"));
}

#[test]
fn add_group_twice_fails_and_creates_no_commit() {
    let authority = TestAuthority::new().expect("authority");
    let service = authority.service().expect("service");
    service.add_group("aGroup").expect("first");
    let commits = authority.remote_commit_count().expect("count");

    let err = service.add_group("aGroup").expect_err("second");
    assert_eq!(err.kind(), ErrorKind::GroupAlreadyExists);
    assert!(err.is_validation());
    assert_eq!(authority.remote_commit_count().expect("count"), commits);
}

#[test]
fn local_and_remote_heads_match_after_add_group() {
    let authority = TestAuthority::new().expect("authority");
    let service = authority.service().expect("service");

    service.add_group("gandalf").expect("add");
    assert_eq!(
        authority.local_head().expect("local"),
        authority.remote_head().expect("remote")
    );
}

#[test]
fn remove_group_commits_with_audited_message() {
    let authority = TestAuthority::new().expect("authority");
    let service = authority.service().expect("service");
    service.add_group("someGroup").expect("add");
    assert!(local_doc(&authority).has_section("group someGroup"));

    service.remove_group("someGroup").expect("remove");
    assert!(!local_doc(&authority).has_section("group someGroup"));
    assert_eq!(
        authority.remote_subject().expect("subject"),
        "Removing group someGroup from gitosis.conf"
    );
    // Back to the seeded content.
    assert_eq!(authority.remote_conf().expect("remote conf"), SEED_CONF);
}

#[test]
fn remove_missing_group_fails() {
    let authority = TestAuthority::new().expect("authority");
    let service = authority.service().expect("service");
    let err = service.remove_group("ghost").expect_err("missing");
    assert_eq!(err.kind(), ErrorKind::GroupNotFound);
}

#[test]
fn add_member_to_group_without_project() {
    let authority = TestAuthority::new().expect("authority");
    let service = authority.service().expect("service");
    service.add_group("take-over-the-world").expect("group");
    service
        .add_member("take-over-the-world", "brain")
        .expect("member");

    let doc = local_doc(&authority);
    assert_eq!(
        doc.get_option("group take-over-the-world", "members"),
        Some("brain")
    );
}

#[test]
fn add_member_commits_with_audited_message() {
    let authority = TestAuthority::new().expect("authority");
    let service = authority.service().expect("service");
    service.add_group("someTeam").expect("group");
    service.add_member("someTeam", "brain").expect("member");

    assert_eq!(
        authority.remote_subject().expect("subject"),
        "Adding member brain for group someTeam"
    );
}

#[test]
fn members_are_stored_in_insertion_order() {
    let authority = TestAuthority::new().expect("authority");
    let service = authority.service().expect("service");
    service.add_group("pink-floyd").expect("group");
    service
        .add_member("pink-floyd", "one-of-these-days")
        .expect("first");
    service
        .add_member("pink-floyd", "comfortably-numb")
        .expect("second");

    assert!(
        authority
            .remote_conf()
            .expect("remote conf")
            .contains("members = one-of-these-days comfortably-numb\n")
    );
    assert_eq!(
        service.members("pink-floyd").expect("members"),
        vec!["one-of-these-days", "comfortably-numb"]
    );
}

#[test]
fn duplicate_member_is_rejected() {
    let authority = TestAuthority::new().expect("authority");
    let service = authority.service().expect("service");
    service.add_group("pink-floyd").expect("group");
    service.add_member("pink-floyd", "time").expect("first");

    let err = service
        .add_member("pink-floyd", "time")
        .expect_err("duplicate");
    assert_eq!(err.kind(), ErrorKind::MemberAlreadyInGroup);
    assert_eq!(err.to_string(), "This user is already member of this group");
    assert_eq!(service.members("pink-floyd").expect("members").len(), 1);
}

#[test]
fn remove_member_commits_and_keeps_order() {
    let authority = TestAuthority::new().expect("authority");
    let service = authority.service().expect("service");
    service.add_group("band").expect("group");
    for member in ["roger", "david", "nick"] {
        service.add_member("band", member).expect("member");
    }

    service.remove_member("band", "david").expect("remove");
    assert_eq!(
        service.members("band").expect("members"),
        vec!["roger", "nick"]
    );
    assert_eq!(
        authority.remote_subject().expect("subject"),
        "Removing member david from group band"
    );
}

#[test]
fn every_mutation_replicates_exact_file_content() {
    let authority = TestAuthority::new().expect("authority");
    let service = authority.service().expect("service");
    let start = authority.remote_commit_count().expect("count");

    service.add_group("a").expect("add a");
    service.add_member("a", "x").expect("add x");
    service.add_group("b").expect("add b");
    service.remove_group("a").expect("remove a");

    assert_eq!(authority.remote_commit_count().expect("count"), start + 4);
    let local = std::fs::read_to_string(authority.conf_path()).expect("local");
    assert_eq!(authority.remote_conf().expect("remote"), local);
}

#[test]
fn conf_path_comes_from_settings() {
    let authority = TestAuthority::new().expect("authority");
    let settings = authority.settings().expect("settings");
    let repo = settings.get_string(GITOSIS_REPO_KEY).expect("repo key");

    let expected = std::path::Path::new(&repo).join("gitosis.conf");
    assert_eq!(conf_path(&settings).expect("conf path"), expected);

    let service =
        gatekeeper::AccessControlService::from_settings(&settings).expect("service");
    assert_eq!(service.conf_path(), expected);
}

#[test]
fn malformed_config_is_surfaced_without_commit() {
    let authority = TestAuthority::new().expect("authority");
    authority
        .push_external_change("members = orphan\n", "Break the config")
        .expect("external push");
    let service = authority.service().expect("service");
    let commits = authority.remote_commit_count().expect("count");

    let err = service.add_group("any").expect_err("malformed");
    assert_eq!(err.kind(), ErrorKind::MalformedConfig);
    assert_eq!(authority.remote_commit_count().expect("count"), commits);
}
