use futures::StreamExt;
use futures::stream;
use std::future::Future;

/// 以有限并发度执行一组异步任务，输出顺序与输入顺序一致
///
/// 超出并发上限的任务会排队等待，而不是立即全部启动。
/// 所有任务都在当前任务中被轮询，丢弃返回的future即可取消仍在执行的任务。
pub async fn do_parallel_with_limit<F, T>(futures: Vec<F>, max_concurrent: usize) -> Vec<T>
where
    F: Future<Output = T>,
{
    stream::iter(futures)
        .buffered(max_concurrent.max(1))
        .collect()
        .await
}
