//! 题目排序服务集成测试
//!
//! 覆盖下标连续性、移动、分组语义与全有或全无的失败行为。

mod common;

use std::sync::Arc;

use ielts_test_builder::error::{AppError, LinkError, OrderError};
use ielts_test_builder::infrastructure::EntityStore;
use ielts_test_builder::models::{EntityId, SectionKind};
use ielts_test_builder::services::OrderingService;

use common::{create_part, draft, new_store, FailingStore};

/// 依次插入 n 道题，返回题目 ID（按插入顺序）
async fn insert_questions<S: EntityStore>(
    ordering: &OrderingService<S>,
    part_id: &EntityId,
    n: usize,
) -> Vec<EntityId> {
    let mut ids = Vec::new();
    for i in 0..n {
        let (id, position) = ordering
            .insert(part_id, draft(&format!("题目 {}", i + 1)), None)
            .await
            .expect("插入题目失败");
        assert_eq!(position, i, "追加插入的下标应连续递增");
        ids.push(id);
    }
    ids
}

#[tokio::test]
async fn test_insert_yields_contiguous_indices() {
    let store = new_store();
    let ordering = OrderingService::new(Arc::clone(&store));
    let part = create_part(store.as_ref(), SectionKind::Listening, "Part 1").await;

    let ids = insert_questions(&ordering, &part.id, 5).await;

    let aggregate = ordering.part_questions(&part.id).await.expect("读取失败");
    assert_eq!(aggregate.question_ids(), ids.as_slice());

    // 题目实体带回所属 Part 的反向引用
    for id in &ids {
        let record = store.get(id).await.expect("题目应存在");
        assert_eq!(record.data.parent_ref(), Some(&part.id));
    }
}

#[tokio::test]
async fn test_insert_at_position() {
    let store = new_store();
    let ordering = OrderingService::new(Arc::clone(&store));
    let part = create_part(store.as_ref(), SectionKind::Listening, "Part 1").await;

    let ids = insert_questions(&ordering, &part.id, 3).await;

    let (new_id, position) = ordering
        .insert(&part.id, draft("插队题"), Some(1))
        .await
        .expect("指定位置插入失败");
    assert_eq!(position, 1);

    let aggregate = ordering.part_questions(&part.id).await.expect("读取失败");
    assert_eq!(
        aggregate.question_ids(),
        &[ids[0].clone(), new_id, ids[1].clone(), ids[2].clone()]
    );

    // 越界位置拒绝
    let err = ordering
        .insert(&part.id, draft("越界题"), Some(9))
        .await
        .expect_err("越界插入应拒绝");
    assert!(matches!(err, AppError::Order(OrderError::OutOfRange { .. })));
}

#[tokio::test]
async fn test_remove_renumbers_and_deletes() {
    let store = new_store();
    let ordering = OrderingService::new(Arc::clone(&store));
    let part = create_part(store.as_ref(), SectionKind::Reading, "Part 1").await;

    let ids = insert_questions(&ordering, &part.id, 4).await;

    // 移除中间一题，其余相对顺序不变
    ordering.remove(&part.id, &ids[1]).await.expect("移除失败");

    let aggregate = ordering.part_questions(&part.id).await.expect("读取失败");
    assert_eq!(
        aggregate.question_ids(),
        &[ids[0].clone(), ids[2].clone(), ids[3].clone()]
    );

    // 题目实体已随之删除
    store.get(&ids[1]).await.expect_err("被移除的题目应已删除");

    // 移除不在列表中的题目
    let err = ordering
        .remove(&part.id, &ids[1])
        .await
        .expect_err("重复移除应拒绝");
    assert!(matches!(err, AppError::Link(LinkError::NotFound { .. })));
}

#[tokio::test]
async fn test_remove_rolls_back_on_delete_failure() {
    let store = Arc::new(FailingStore::new());
    let ordering = OrderingService::new(Arc::clone(&store));
    let part = create_part(store.as_ref(), SectionKind::Reading, "Part 1").await;

    let ids = insert_questions(&ordering, &part.id, 3).await;

    store.fail_delete(true);
    ordering
        .remove(&part.id, &ids[0])
        .await
        .expect_err("删除被注入故障时整个操作应失败");
    store.fail_delete(false);

    // 失败的操作不留半改状态：列表恢复原样
    let aggregate = ordering.part_questions(&part.id).await.expect("读取失败");
    assert_eq!(aggregate.question_ids(), ids.as_slice());
}

#[tokio::test]
async fn test_move_question() {
    let store = new_store();
    let ordering = OrderingService::new(Arc::clone(&store));
    let part = create_part(store.as_ref(), SectionKind::Listening, "Part 1").await;

    let ids = insert_questions(&ordering, &part.id, 4).await;

    ordering
        .move_question(&part.id, &ids[0], 2)
        .await
        .expect("移动失败");
    let aggregate = ordering.part_questions(&part.id).await.expect("读取失败");
    assert_eq!(
        aggregate.question_ids(),
        &[ids[1].clone(), ids[2].clone(), ids[0].clone(), ids[3].clone()]
    );

    // 目标位置等于列表长度：越界
    let err = ordering
        .move_question(&part.id, &ids[0], 4)
        .await
        .expect_err("越界移动应拒绝");
    assert!(matches!(err, AppError::Order(OrderError::OutOfRange { .. })));
}

#[tokio::test]
async fn test_group_range_and_overlap() {
    let store = new_store();
    let ordering = OrderingService::new(Arc::clone(&store));
    let part = create_part(store.as_ref(), SectionKind::Reading, "Part 1").await;

    insert_questions(&ordering, &part.id, 8).await;

    ordering
        .group_range(&part.id, 2, 5, "根据短文回答 3-6 题")
        .await
        .expect("创建分组失败");

    let before = ordering.part_questions(&part.id).await.expect("读取失败");

    // 与已有分组相交
    let err = ordering
        .group_range(&part.id, 4, 7, "另一段提示")
        .await
        .expect_err("重叠分组应拒绝");
    assert!(matches!(
        err,
        AppError::Order(OrderError::OverlappingGroup { .. })
    ));

    // 失败的调用不改变状态
    let after = ordering.part_questions(&part.id).await.expect("读取失败");
    assert_eq!(before.groups(), after.groups());

    // 非法区间
    let err = ordering
        .group_range(&part.id, 5, 2, "颠倒区间")
        .await
        .expect_err("start > end 应拒绝");
    assert!(matches!(err, AppError::Order(OrderError::InvalidRange { .. })));

    let err = ordering
        .group_range(&part.id, 6, 8, "越界区间")
        .await
        .expect_err("越界区间应拒绝");
    assert!(matches!(err, AppError::Order(OrderError::InvalidRange { .. })));
}

#[tokio::test]
async fn test_groups_shift_on_insert_and_shrink_on_remove() {
    let store = new_store();
    let ordering = OrderingService::new(Arc::clone(&store));
    let part = create_part(store.as_ref(), SectionKind::Reading, "Part 1").await;

    let ids = insert_questions(&ordering, &part.id, 6).await;
    ordering
        .group_range(&part.id, 2, 4, "共享提示")
        .await
        .expect("创建分组失败");

    // 在分组之前插入：分组整体平移
    ordering
        .insert(&part.id, draft("新题"), Some(0))
        .await
        .expect("插入失败");
    let aggregate = ordering.part_questions(&part.id).await.expect("读取失败");
    assert_eq!(aggregate.groups()[0].start, 3);
    assert_eq!(aggregate.groups()[0].end, 5);

    // 移除分组覆盖的一题：区间收缩
    ordering.remove(&part.id, &ids[2]).await.expect("移除失败");
    let aggregate = ordering.part_questions(&part.id).await.expect("读取失败");
    assert_eq!(aggregate.groups()[0].start, 3);
    assert_eq!(aggregate.groups()[0].end, 4);
}

#[tokio::test]
async fn test_single_question_group_dissolves_on_remove() {
    let store = new_store();
    let ordering = OrderingService::new(Arc::clone(&store));
    let part = create_part(store.as_ref(), SectionKind::Listening, "Part 1").await;

    let ids = insert_questions(&ordering, &part.id, 3).await;
    ordering
        .group_range(&part.id, 1, 1, "单题分组")
        .await
        .expect("创建分组失败");

    ordering.remove(&part.id, &ids[1]).await.expect("移除失败");

    // 收缩为空的分组随之解散
    let aggregate = ordering.part_questions(&part.id).await.expect("读取失败");
    assert!(aggregate.groups().is_empty());
}

#[tokio::test]
async fn test_move_refuses_to_tear_group() {
    let store = new_store();
    let ordering = OrderingService::new(Arc::clone(&store));
    let part = create_part(store.as_ref(), SectionKind::Reading, "Part 1").await;

    let ids = insert_questions(&ordering, &part.id, 6).await;
    ordering
        .group_range(&part.id, 1, 3, "共享提示")
        .await
        .expect("创建分组失败");

    let before = ordering.part_questions(&part.id).await.expect("读取失败");

    // 把分组内的题移出去
    let err = ordering
        .move_question(&part.id, &ids[2], 5)
        .await
        .expect_err("移出分组应拒绝");
    assert!(matches!(err, AppError::Order(OrderError::InvalidRange { .. })));

    // 把分组外的题移进来
    let err = ordering
        .move_question(&part.id, &ids[5], 2)
        .await
        .expect_err("移入分组应拒绝");
    assert!(matches!(err, AppError::Order(OrderError::InvalidRange { .. })));

    // 失败的移动不改变状态
    let after = ordering.part_questions(&part.id).await.expect("读取失败");
    assert_eq!(before.question_ids(), after.question_ids());
    assert_eq!(before.groups(), after.groups());
}

#[tokio::test]
async fn test_move_shifts_whole_group_between_endpoints() {
    let store = new_store();
    let ordering = OrderingService::new(Arc::clone(&store));
    let part = create_part(store.as_ref(), SectionKind::Reading, "Part 1").await;

    let ids = insert_questions(&ordering, &part.id, 5).await;
    ordering
        .group_range(&part.id, 1, 2, "共享提示")
        .await
        .expect("创建分组失败");

    // 起落点都在分组之外：夹在中间的分组整体平移
    ordering
        .move_question(&part.id, &ids[0], 4)
        .await
        .expect("移动失败");

    let aggregate = ordering.part_questions(&part.id).await.expect("读取失败");
    assert_eq!(
        aggregate.question_ids(),
        &[ids[1].clone(), ids[2].clone(), ids[3].clone(), ids[4].clone(), ids[0].clone()]
    );
    assert_eq!(aggregate.groups()[0].start, 0);
    assert_eq!(aggregate.groups()[0].end, 1);
}

#[tokio::test]
async fn test_ungroup() {
    let store = new_store();
    let ordering = OrderingService::new(Arc::clone(&store));
    let part = create_part(store.as_ref(), SectionKind::Reading, "Part 1").await;

    insert_questions(&ordering, &part.id, 4).await;
    ordering
        .group_range(&part.id, 0, 2, "共享提示")
        .await
        .expect("创建分组失败");

    ordering.ungroup(&part.id, 0).await.expect("解散分组失败");
    let aggregate = ordering.part_questions(&part.id).await.expect("读取失败");
    assert!(aggregate.groups().is_empty());

    // 不存在的分组起点
    let err = ordering
        .ungroup(&part.id, 0)
        .await
        .expect_err("不存在的分组应拒绝");
    assert!(matches!(err, AppError::Order(OrderError::InvalidRange { .. })));
}
