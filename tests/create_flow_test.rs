//! 创建流程与编排会话集成测试
//!
//! 覆盖预填解析、创建即链接、部分成功上报、蓝图播种与认证门控。

mod common;

use std::sync::Arc;

use ielts_test_builder::config::Config;
use ielts_test_builder::error::{AppError, StoreError};
use ielts_test_builder::infrastructure::EntityStore;
use ielts_test_builder::models::{
    load_all_blueprints, AuthState, EntityData, EntityId, Role, SectionKind,
};
use ielts_test_builder::orchestrator::BuilderSession;
use ielts_test_builder::routing::{self, PrefillParent};
use ielts_test_builder::services::{CompositionService, OrderingService};
use ielts_test_builder::workflow::{BuilderCtx, CreateFlow, CreateOutcome};

use common::{child_ids, create_section, create_test, new_store, FailingStore};

fn build_flow<S: EntityStore>(store: Arc<S>) -> CreateFlow<S> {
    let composition = Arc::new(CompositionService::new(Arc::clone(&store)));
    let ordering = Arc::new(OrderingService::new(Arc::clone(&store)));
    CreateFlow::new(store, composition, ordering, &Config::default())
}

fn section_data(kind: SectionKind, title: &str) -> EntityData {
    EntityData::Section {
        section_kind: kind,
        title: title.to_string(),
        payload_ref: None,
        part_ids: Vec::new(),
        test_id: None,
    }
}

#[tokio::test]
async fn test_create_with_prefill_links() {
    let store = new_store();
    let flow = build_flow(Arc::clone(&store));

    let test = create_test(store.as_ref(), "剑桥雅思 19 Test 2").await;

    // 预填父级来自查询参数
    let ctx = BuilderCtx::from_route(
        &routing::section_create_path(SectionKind::Listening),
        &format!("?testId={}", test.id),
    );
    assert_eq!(ctx.prefill, Some(PrefillParent::Test(test.id.clone())));

    let outcome = flow
        .create(section_data(SectionKind::Listening, "听力一"), &ctx)
        .await
        .expect("创建失败");

    assert!(!outcome.is_partial());
    let record = outcome.record();
    assert_eq!(record.data.parent_ref(), Some(&test.id));
    assert_eq!(
        child_ids(store.as_ref(), &test.id).await,
        vec![record.id.clone()]
    );
}

#[tokio::test]
async fn test_create_without_prefill_stays_unlinked() {
    let store = new_store();
    let flow = build_flow(Arc::clone(&store));

    // 参数存在但无法解析：按无预填处理
    let ctx = BuilderCtx::from_route(
        &routing::section_create_path(SectionKind::Reading),
        "?testId=not a valid id!",
    );
    assert_eq!(ctx.prefill, None);

    let outcome = flow
        .create(section_data(SectionKind::Reading, "阅读一"), &ctx)
        .await
        .expect("创建失败");

    assert!(matches!(outcome, CreateOutcome::Created(_)));
    assert_eq!(outcome.record().data.parent_ref(), None);
}

#[tokio::test]
async fn test_created_but_unlinked_on_link_failure() {
    let store = Arc::new(FailingStore::new());
    let flow = build_flow(Arc::clone(&store));

    let test = create_test(store.as_ref(), "模拟卷").await;
    let ctx = BuilderCtx::new(
        routing::section_create_path(SectionKind::Listening),
        Some(PrefillParent::Test(test.id.clone())),
    );

    // 创建放行、链接写入失败
    store.fail_update(true);
    let outcome = flow
        .create(section_data(SectionKind::Listening, "听力一"), &ctx)
        .await
        .expect("部分成功不是硬失败");
    store.fail_update(false);

    let CreateOutcome::CreatedButUnlinked { record, reason } = outcome else {
        panic!("应上报 CreatedButUnlinked");
    };
    assert!(matches!(reason, AppError::Store(StoreError::BadResponse { .. })));

    // 新实体可独立读取，但不在父节点的子列表里
    let standalone = store.get(&record.id).await.expect("新实体应可独立读取");
    assert_eq!(standalone.data.parent_ref(), None);
    assert!(child_ids(store.as_ref(), &test.id).await.is_empty());
}

#[tokio::test]
async fn test_created_but_unlinked_on_missing_parent() {
    let store = new_store();
    let flow = build_flow(Arc::clone(&store));

    let ghost = EntityId::parse("no-such-parent").expect("ID 格式合法");
    let ctx = BuilderCtx::new(
        routing::section_create_path(SectionKind::Writing),
        Some(PrefillParent::Test(ghost)),
    );

    let outcome = flow
        .create(section_data(SectionKind::Writing, "写作一"), &ctx)
        .await
        .expect("部分成功不是硬失败");

    let CreateOutcome::CreatedButUnlinked { record, reason } = outcome else {
        panic!("应上报 CreatedButUnlinked");
    };
    assert!(matches!(reason, AppError::Store(StoreError::NotFound { .. })));
    store.get(&record.id).await.expect("新实体应可独立读取");
}

#[tokio::test]
async fn test_prefill_kind_mismatch_leaves_unlinked() {
    let store = new_store();
    let flow = build_flow(Arc::clone(&store));

    let reading = create_section(store.as_ref(), SectionKind::Reading, "阅读一").await;
    let ctx = BuilderCtx::new(
        routing::linked_parts_path(SectionKind::Reading, &reading.id),
        Some(PrefillParent::Section(SectionKind::Reading, reading.id.clone())),
    );

    // 听力 Part 挂到阅读 Section：创建成功但链接被类型规则拒绝
    let outcome = flow
        .create(
            EntityData::Part {
                section_kind: SectionKind::Listening,
                title: "听力 Part".to_string(),
                question_ids: Vec::new(),
                groups: Vec::new(),
                section_id: None,
            },
            &ctx,
        )
        .await
        .expect("部分成功不是硬失败");

    assert!(outcome.is_partial());
    assert!(child_ids(store.as_ref(), &reading.id).await.is_empty());
}

#[tokio::test]
async fn test_seed_blueprint_from_toml_folder() {
    let store = new_store();
    let flow = build_flow(Arc::clone(&store));

    let folder = std::env::temp_dir().join(format!("ielts_blueprints_{}", uuid::Uuid::new_v4()));
    tokio::fs::create_dir_all(&folder).await.expect("创建临时目录失败");

    let blueprint_toml = r#"
name = "2026 模拟卷一"
province = "云南"
year = "2026"

[[sections]]
kind = "listening"
title = "听力部分"

[[sections.parts]]
title = "Part 1"

[[sections.parts.stemlist]]
stem = "What time does the library open?"
question_type = "multiple_choice"
answer = "B"

[[sections.parts.stemlist]]
stem = "Complete the booking form below."
question_type = "fill_blank"
answer = "9am"

[[sections]]
kind = "writing"
title = "写作部分"

[[sections.tasks]]
prompt = "The chart below shows library visits. Summarise the information."
"#;
    tokio::fs::write(folder.join("mock_test_1.toml"), blueprint_toml)
        .await
        .expect("写入蓝图失败");
    // 坏文件不应中止整批加载
    tokio::fs::write(folder.join("broken.toml"), "name = [unclosed")
        .await
        .expect("写入坏蓝图失败");

    let blueprints = load_all_blueprints(&folder.to_string_lossy())
        .await
        .expect("加载蓝图失败");
    assert_eq!(blueprints.len(), 1, "坏文件应被跳过");
    assert_eq!(blueprints[0].node_count(), 7);

    let report = flow
        .seed_blueprint(&blueprints[0])
        .await
        .expect("播种失败");

    assert_eq!(report.created, 7, "试卷 + 两个 Section + Part + 两道题 + 写作任务");
    assert_eq!(report.linked, 6, "除试卷外每个节点都已链接");
    assert!(report.partial_nodes.is_empty());
    assert_eq!(report.failed, 0);

    // 校验播种出的组合图
    let test_id = report.test_id.expect("应返回试卷 ID");
    let test = store.get(&test_id).await.expect("试卷应存在");
    let EntityData::Test { sections, .. } = &test.data else {
        panic!("应为试卷记录");
    };
    assert_eq!(sections.listening.len(), 1);
    assert_eq!(sections.writing.len(), 1);
    assert!(sections.reading.is_empty());

    let listening = store.get(&sections.listening[0]).await.expect("读取失败");
    let EntityData::Section { part_ids, .. } = &listening.data else {
        panic!("应为 Section 记录");
    };
    assert_eq!(part_ids.len(), 1);

    let part = store.get(&part_ids[0]).await.expect("读取失败");
    assert_eq!(part.data.child_ids().len(), 2);

    tokio::fs::remove_dir_all(&folder).await.ok();
}

#[tokio::test]
async fn test_session_auth_gate() {
    let store = new_store();

    let folder = std::env::temp_dir().join(format!("ielts_session_{}", uuid::Uuid::new_v4()));
    tokio::fs::create_dir_all(&folder).await.expect("创建临时目录失败");

    let config = Config {
        blueprint_folder: folder.to_string_lossy().to_string(),
        output_log_file: folder.join("output.txt").to_string_lossy().to_string(),
        ..Config::default()
    };

    let mut session =
        BuilderSession::initialize(config, Arc::clone(&store)).expect("初始化会话失败");

    // 认证加载期间拒绝一切数据与前进导航操作
    let ctx = BuilderCtx::new(routing::TEST_CREATE_PATH, None);
    assert!(session
        .create_entity(
            EntityData::Test {
                title: "早到的请求".to_string(),
                metadata: Default::default(),
                sections: Default::default(),
            },
            &ctx,
        )
        .await
        .is_err());
    assert!(session
        .open(routing::TESTS_PATH, Default::default())
        .is_err());

    // 只读角色可导航、不可写
    session.update_auth(AuthState::authenticated(Role::Viewer));
    session
        .open(routing::TESTS_PATH, Default::default())
        .expect("已认证后导航应放行");
    assert!(session
        .create_entity(
            EntityData::Test {
                title: "只读角色的请求".to_string(),
                metadata: Default::default(),
                sections: Default::default(),
            },
            &ctx,
        )
        .await
        .is_err());

    // 编辑角色放行写操作
    session.update_auth(AuthState::authenticated(Role::Editor));
    let outcome = session
        .create_entity(
            EntityData::Test {
                title: "正式创建".to_string(),
                metadata: Default::default(),
                sections: Default::default(),
            },
            &ctx,
        )
        .await
        .expect("编辑角色创建应成功");
    assert!(!outcome.is_partial());

    // 返回导航永不失败
    let back = session.go_back(routing::TESTS_PATH);
    assert_eq!(back.path.as_deref(), Some("/"));

    tokio::fs::remove_dir_all(&folder).await.ok();
}
