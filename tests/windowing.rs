use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;
use streamweave_windowing::clock::ManualClock;
use streamweave_windowing::config::FlowConfig;
use streamweave_windowing::dataset::{Dataset, UpstreamWindowing};
use streamweave_windowing::error::FlowError;
use streamweave_windowing::flow::Flow;
use streamweave_windowing::functions::sums;
use streamweave_windowing::reduce_by_key::{ReduceByKey, WindowedPair};
use streamweave_windowing::sink::{LateDataCollector, ListSink};
use streamweave_windowing::source::ListSource;
use streamweave_windowing::window::{CountWindow, GroupTag, LateDataPolicy, TimeInterval, Window};
use streamweave_windowing::windowing::{CountWindowing, SessionWindowing, TimeWindowing};

type Word = (String, i64);

// Words with out-of-order event times spanning three one-second windows.
fn words() -> Vec<Word> {
  [
    ("one", 3_001),
    ("one", 3_500),
    ("one", 1_000),
    ("one", 2_100),
    ("one", 2_050),
    ("one", 2_099),
    ("two", 1_100),
    ("two", 1_500),
    ("two", 1_900),
    ("two", 2_199),
    ("two", 2_355),
    ("four", 1_500),
    ("four", 1_200),
    ("three", 1_000),
    ("three", 2_831),
    ("three", 2_123),
  ]
  .into_iter()
  .map(|(word, ts)| (word.to_string(), ts))
  .collect()
}

fn word_counts(input: Dataset<Word>, partitions: usize) -> Result<Dataset<(String, u64)>, FlowError> {
  ReduceByKey::of(input)
    .key_by(|(word, _): &Word| word.clone())
    .value_by(|_| 1u64)
    .combine_by(sums::of_u64s())
    .window_by(TimeWindowing::seconds(1).using(|(_, ts): &Word| *ts))
    .set_num_partitions(partitions)
    .output()
}

fn by_window<K: Ord + Clone, V: Clone>(pairs: &[WindowedPair<K, V>]) -> BTreeMap<Window, BTreeMap<K, V>> {
  let mut windows: BTreeMap<Window, BTreeMap<K, V>> = BTreeMap::new();
  for pair in pairs {
    let previous = windows
      .entry(pair.window().clone())
      .or_default()
      .insert(pair.key().clone(), pair.value().clone());
    assert!(previous.is_none(), "window emitted twice for one key");
  }
  windows
}

fn second(start: i64) -> Window {
  Window::Time(TimeInterval::new(start, start + 1_000))
}

fn counts(entries: &[(&str, u64)]) -> BTreeMap<String, u64> {
  entries.iter().map(|(k, v)| (k.to_string(), *v)).collect()
}

#[tokio::test]
async fn test_event_time_word_count() {
  let _ = streamweave_windowing::logging::init("warn");
  let flow = Flow::create("word-count");
  let input = flow.create_input(ListSource::bounded(vec![words()]));
  let sink = ListSink::new(1);
  ReduceByKey::of(input)
    .key_by(|(word, _): &Word| word.clone())
    .value_by(|_| 1u64)
    .combine_by(sums::of_u64s())
    .window_by(TimeWindowing::seconds(1).using(|(_, ts): &Word| *ts))
    .named("word-count")
    .output_windowed()
    .unwrap()
    .persist(sink.clone())
    .unwrap();
  flow.run().await.unwrap();

  let windows = by_window(&sink.output(0));
  let expected: BTreeMap<Window, BTreeMap<String, u64>> = [
    (second(1_000), counts(&[("one", 1), ("two", 3), ("three", 1), ("four", 2)])),
    (second(2_000), counts(&[("one", 3), ("two", 2), ("three", 2)])),
    (second(3_000), counts(&[("one", 2)])),
  ]
  .into_iter()
  .collect();
  assert_eq!(windows, expected);

  let stats = flow.stats();
  assert_eq!(stats.len(), 1);
  assert_eq!(stats[0].component.name, "word-count");
  assert_eq!(stats[0].stats.elements, 16);
  assert_eq!(stats[0].stats.windows_fired, 8);
  assert_eq!(stats[0].stats.late_elements, 0);
}

async fn formatted_word_counts(partitions: usize) -> Vec<String> {
  let flow = Flow::create("formatted");
  let input = flow.create_input(ListSource::bounded(vec![words()]));
  let sink = ListSink::new(1);
  word_counts(input, partitions)
    .unwrap()
    .map(|(word, count)| format!("{}-{}", word, count))
    .repartition()
    .set_num_partitions(1)
    .output()
    .unwrap()
    .persist(sink.clone())
    .unwrap();
  flow.run().await.unwrap();
  let mut output = sink.output(0);
  output.sort();
  output
}

#[tokio::test]
async fn test_out_of_order_event_times_lose_nothing() {
  let mut expected = vec![
    "one-1", "two-3", "three-1", "four-2", "one-3", "two-2", "three-2", "one-2",
  ];
  expected.sort();
  assert_eq!(formatted_word_counts(1).await, expected);
  assert_eq!(formatted_word_counts(3).await, expected);
}

async fn totals_per_window(partitions: usize, repartition: Option<usize>) -> BTreeMap<Window, u64> {
  let flow = Flow::create("totals");
  let input = flow.create_input(ListSource::bounded(vec![words()]));
  let mut counted = word_counts(input, partitions).unwrap();
  if let Some(n) = repartition {
    counted = counted.repartition().set_num_partitions(n).output().unwrap();
  }
  let sink = ListSink::new(1);
  ReduceByKey::of(counted.map(|(_, count)| count))
    .key_by(|_: &u64| "all".to_string())
    .value_by(|count: &u64| *count)
    .combine_by(sums::of_u64s())
    .output_windowed()
    .unwrap()
    .persist(sink.clone())
    .unwrap();
  flow.run().await.unwrap();

  by_window(&sink.output(0))
    .into_iter()
    .map(|(window, mut values)| (window, values.remove("all").unwrap()))
    .collect()
}

fn expected_totals() -> BTreeMap<Window, u64> {
  [(second(1_000), 7), (second(2_000), 7), (second(3_000), 2)]
    .into_iter()
    .collect()
}

#[tokio::test]
async fn test_attached_windowing_single_partition() {
  assert_eq!(totals_per_window(1, None).await, expected_totals());
}

#[tokio::test]
async fn test_attached_windowing_many_partitions() {
  assert_eq!(totals_per_window(3, None).await, expected_totals());
}

#[tokio::test]
async fn test_attached_windowing_survives_repartition() {
  assert_eq!(totals_per_window(2, Some(4)).await, expected_totals());
  assert_eq!(totals_per_window(3, Some(1)).await, expected_totals());
}

#[tokio::test]
async fn test_attached_windowing_without_element_wise_operator() {
  let flow = Flow::create("direct");
  let input = flow.create_input(ListSource::bounded(vec![words()]));
  let counted = word_counts(input, 2).unwrap();
  assert!(matches!(counted.windowing(), UpstreamWindowing::Operator(_)));
  let sink = ListSink::new(1);
  ReduceByKey::of(counted)
    .key_by(|_: &(String, u64)| ())
    .value_by(|(word, _): &(String, u64)| word.clone())
    .reduce_by(|mut words| {
      words.sort();
      words.join(",")
    })
    .output_windowed()
    .unwrap()
    .persist(sink.clone())
    .unwrap();
  flow.run().await.unwrap();

  let joined: BTreeMap<Window, String> = sink
    .output(0)
    .into_iter()
    .map(|pair| (pair.window().clone(), pair.value().clone()))
    .collect();
  let expected: BTreeMap<Window, String> = [
    (second(1_000), "four,one,three,two".to_string()),
    (second(2_000), "one,three,two".to_string()),
    (second(3_000), "one".to_string()),
  ]
  .into_iter()
  .collect();
  assert_eq!(joined, expected);
}

#[tokio::test]
async fn test_filter_and_flat_map_keep_labels() {
  let flow = Flow::create("filtered");
  let input = flow.create_input(ListSource::bounded(vec![words()]));
  let frequent = word_counts(input, 2)
    .unwrap()
    .filter(|(_, count)| *count > 1)
    .flat_map(|(word, count)| vec![(word.clone(), count), (word, 0)]);
  let sink = ListSink::new(1);
  ReduceByKey::of(frequent)
    .key_by(|_: &(String, u64)| "all".to_string())
    .value_by(|(_, count): &(String, u64)| *count)
    .combine_by(|a, b| a + b)
    .output_windowed()
    .unwrap()
    .persist(sink.clone())
    .unwrap();
  flow.run().await.unwrap();

  let totals: BTreeMap<Window, u64> = sink
    .output(0)
    .into_iter()
    .map(|pair| (pair.window().clone(), *pair.value()))
    .collect();
  let expected: BTreeMap<Window, u64> = [(second(1_000), 5), (second(2_000), 7), (second(3_000), 2)]
    .into_iter()
    .collect();
  assert_eq!(totals, expected);
}

#[tokio::test(start_paused = true)]
async fn test_early_triggering_emits_partial_results() {
  let flow = Flow::create("continuous");
  let items: Vec<Word> = (0..10).map(|_| ("a".to_string(), 0)).collect();
  let input = flow.create_input(ListSource::unbounded(vec![items]).set_sleep_time(Duration::from_millis(100)));
  let sink = ListSink::new(1);
  ReduceByKey::of(input)
    .key_by(|(word, _): &Word| word.clone())
    .value_by(|_| 1u64)
    .combine_by(sums::of_u64s())
    .window_by(
      TimeWindowing::seconds(10)
        .using(|(_, ts): &Word| *ts)
        .early_triggering(Duration::from_millis(300)),
    )
    .output()
    .unwrap()
    .persist(sink.clone())
    .unwrap();
  flow.run().await.unwrap();

  let values: Vec<u64> = sink.output(0).into_iter().map(|(_, count)| count).collect();
  assert!(values.len() >= 3, "expected early snapshots, got {:?}", values);
  assert_eq!(values.last(), Some(&10));
  let (last, early) = values.split_last().unwrap();
  assert!(early.iter().all(|v| v < last));
  assert!(early.windows(2).all(|pair| pair[0] <= pair[1]));
  assert!(flow.stats()[0].stats.early_firings >= 2);
}

#[tokio::test]
async fn test_session_windows() {
  let flow = Flow::create("sessions");
  let clicks: Vec<Word> = [
    ("alice", 1_000),
    ("alice", 4_000),
    ("bob", 2_000),
    ("alice", 9_000),
    ("bob", 20_000),
    ("alice", 30_000),
  ]
  .into_iter()
  .map(|(user, ts)| (user.to_string(), ts))
  .collect();
  let input = flow.create_input(ListSource::bounded(vec![clicks]));
  let sink = ListSink::new(1);
  ReduceByKey::of(input)
    .key_by(|(user, _): &Word| user.clone())
    .value_by(|(_, ts): &Word| *ts)
    .reduce_by(|timestamps| timestamps.len())
    .window_by(
      SessionWindowing::of(Duration::from_secs(5)).using(|(user, _): &Word| user.clone(), |(_, ts): &Word| *ts),
    )
    .output_windowed()
    .unwrap()
    .persist(sink.clone())
    .unwrap();
  flow.run().await.unwrap();

  let mut sessions: Vec<(String, Option<i64>, Option<i64>, usize)> = sink
    .output(0)
    .into_iter()
    .map(|pair| {
      (
        pair.key().clone(),
        pair.window().start_millis(),
        pair.window().end_millis(),
        *pair.value(),
      )
    })
    .collect();
  sessions.sort();
  assert_eq!(
    sessions,
    vec![
      ("alice".to_string(), Some(1_000), Some(14_000), 3),
      ("alice".to_string(), Some(30_000), Some(35_000), 1),
      ("bob".to_string(), Some(2_000), Some(7_000), 1),
      ("bob".to_string(), Some(20_000), Some(25_000), 1),
    ]
  );
  assert_eq!(flow.stats()[0].stats.merges, 2);
}

#[tokio::test]
async fn test_count_windows() {
  let flow = Flow::create("count");
  let input = flow.create_input(ListSource::bounded(vec![(1..=7).collect::<Vec<u64>>()]));
  let sink = ListSink::new(1);
  ReduceByKey::of(input)
    .key_by(|_: &u64| "k")
    .value_by(|x: &u64| *x)
    .combine_by(sums::of_u64s())
    .window_by(CountWindowing::of(3))
    .output_windowed()
    .unwrap()
    .persist(sink.clone())
    .unwrap();
  flow.run().await.unwrap();

  let sums: BTreeMap<Window, u64> = sink
    .output(0)
    .into_iter()
    .map(|pair| (pair.window().clone(), *pair.value()))
    .collect();
  let expected: BTreeMap<Window, u64> = [(0, 6), (1, 15), (2, 7)]
    .into_iter()
    .map(|(ordinal, sum)| (Window::Count(CountWindow::new(GroupTag::of("k"), ordinal)), sum))
    .collect();
  assert_eq!(sums, expected);
}

#[tokio::test]
async fn test_processing_time_windows_after_source() {
  let flow = Flow::create("processing-time").with_clock(Arc::new(ManualClock::new(5_250)));
  let input = flow.create_input(ListSource::bounded(vec![vec!["x", "y", "x"]]));
  let sink = ListSink::new(1);
  ReduceByKey::of(input)
    .key_by(|word: &&str| word.to_string())
    .value_by(|_| 1u64)
    .combine_by(sums::of_u64s())
    .output_windowed()
    .unwrap()
    .persist(sink.clone())
    .unwrap();
  flow.run().await.unwrap();

  let windows = by_window(&sink.output(0));
  let expected: BTreeMap<Window, BTreeMap<String, u64>> =
    [(Window::Time(TimeInterval::new(5_000, 6_000)), counts(&[("x", 2), ("y", 1)]))]
      .into_iter()
      .collect();
  assert_eq!(windows, expected);
}

#[tokio::test]
async fn test_late_data_side_output() {
  let flow = Flow::create("late");
  let input = flow.create_input(ListSource::bounded(vec![vec![
    ("a".to_string(), 0),
    ("a".to_string(), 1_500),
    ("a".to_string(), 100),
  ]]));
  let late = LateDataCollector::new();
  let sink = ListSink::new(1);
  ReduceByKey::of(input)
    .key_by(|(word, _): &Word| word.clone())
    .value_by(|_| 1u64)
    .combine_by(sums::of_u64s())
    .window_by(TimeWindowing::seconds(1).using(|(_, ts): &Word| *ts))
    .late_data_output(late.clone())
    .output_windowed()
    .unwrap()
    .persist(sink.clone())
    .unwrap();
  flow.run().await.unwrap();

  let windows = by_window(&sink.output(0));
  assert_eq!(windows.get(&second(0)), Some(&counts(&[("a", 1)])));
  assert_eq!(windows.get(&second(1_000)), Some(&counts(&[("a", 1)])));
  assert_eq!(late.elements(), vec![("a".to_string(), 100)]);
  assert_eq!(flow.stats()[0].stats.late_elements, 1);
}

#[tokio::test]
async fn test_union_of_sources_is_windowable() {
  let flow = Flow::create("union");
  let a = flow.create_input(ListSource::bounded(vec![vec![1u64, 2]]));
  let b = flow.create_input(ListSource::bounded(vec![vec![3u64]]));
  let sink = ListSink::new(1);
  ReduceByKey::of(a.union(b))
    .key_by(|x: &u64| x % 2)
    .value_by(|x: &u64| *x)
    .combine_by(sums::of_u64s())
    .window_by(CountWindowing::of(10))
    .output()
    .unwrap()
    .persist(sink.clone())
    .unwrap();
  flow.run().await.unwrap();

  let mut sums = sink.output(0);
  sums.sort();
  assert_eq!(sums, vec![(0, 2), (1, 4)]);
}

#[tokio::test]
async fn test_attaching_to_ambiguous_union_is_rejected() {
  let flow = Flow::create("ambiguous");
  let windowed = |values: Vec<u64>| {
    let input = flow.create_input(ListSource::bounded(vec![values]));
    ReduceByKey::of(input)
      .key_by(|x: &u64| x % 2)
      .value_by(|x: &u64| *x)
      .combine_by(sums::of_u64s())
      .window_by(CountWindowing::of(1))
      .output()
      .unwrap()
  };
  let union = windowed(vec![1, 2]).union(windowed(vec![3]));
  assert_eq!(union.windowing(), UpstreamWindowing::Ambiguous);
  let err = ReduceByKey::of(union)
    .key_by(|(parity, _): &(u64, u64)| *parity)
    .value_by(|(_, sum): &(u64, u64)| *sum)
    .combine_by(sums::of_u64s())
    .output()
    .unwrap_err();
  assert!(err.is_config(), "unexpected error: {}", err);
}

#[tokio::test]
async fn test_invalid_windowing_is_rejected() {
  let flow = Flow::create("invalid");
  let input = flow.create_input(ListSource::bounded(vec![vec![1u64]]));
  let err = ReduceByKey::of(input)
    .key_by(|x: &u64| *x)
    .value_by(|x: &u64| *x)
    .combine_by(sums::of_u64s())
    .window_by(CountWindowing::of(0))
    .output()
    .unwrap_err();
  assert!(err.is_config());
}

#[tokio::test]
async fn test_side_output_policy_requires_collector() {
  let config = FlowConfig::new("side-output").with_late_data(LateDataPolicy::SideOutput);
  let flow = Flow::from_config(config).unwrap();
  let input = flow.create_input(ListSource::bounded(vec![vec![1u64]]));
  let err = ReduceByKey::of(input)
    .key_by(|x: &u64| *x)
    .value_by(|x: &u64| *x)
    .combine_by(sums::of_u64s())
    .window_by(CountWindowing::of(1))
    .output()
    .unwrap_err();
  assert!(err.is_config());
}

#[tokio::test]
async fn test_user_function_error_aborts_run() {
  let flow = Flow::create("failing");
  let input = flow.create_input(ListSource::bounded(vec![vec![1u64; 5]]));
  let sink = ListSink::new(1);
  ReduceByKey::of(input)
    .key_by(|_: &u64| "k")
    .value_by(|x: &u64| *x)
    .try_combine_by(|a, b| {
      if a + b > 2 {
        Err("too many".into())
      } else {
        Ok(a + b)
      }
    })
    .window_by(CountWindowing::of(10))
    .output()
    .unwrap()
    .persist(sink.clone())
    .unwrap();

  match flow.run().await {
    Err(FlowError::Aggregation { component, source }) => {
      assert_eq!(component.name, "reduce_by_key-1");
      assert_eq!(component.type_name, "ReduceByKey");
      assert_eq!(source.to_string(), "too many");
    }
    other => panic!("unexpected result: {:?}", other),
  }
  assert!(sink.output(0).is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_cancellation_stops_run() {
  let flow = Flow::create("cancelled");
  let input = flow.create_input(
    ListSource::unbounded(vec![vec![1u64; 1_000]]).set_sleep_time(Duration::from_secs(1)),
  );
  let sink = ListSink::new(1);
  input.map(|x| x + 1).persist(sink.clone()).unwrap();

  let token = flow.cancellation_token();
  tokio::spawn(async move {
    tokio::time::sleep(Duration::from_millis(2_500)).await;
    token.cancel();
  });
  let err = flow.run().await.unwrap_err();
  assert!(matches!(err, FlowError::Cancelled));
  assert!(sink.output(0).len() <= 3);
}

async fn session_spans(partitions: usize) -> BTreeMap<(i64, i64), u64> {
  let flow = Flow::create("grouped-sessions");
  let events: Vec<Word> = [
    ("a1", 1_000),
    ("a2", 4_000),
    ("a3", 8_000),
    ("a4", 10_000),
    ("a5", 12_000),
    ("a6", 14_000),
  ]
  .into_iter()
  .map(|(word, ts)| (word.to_string(), ts))
  .collect();
  let input = flow.create_input(ListSource::bounded(vec![events]));
  let sink = ListSink::new(1);
  ReduceByKey::of(input)
    .key_by(|(word, _): &Word| word.clone())
    .value_by(|_| 1u64)
    .combine_by(sums::of_u64s())
    .window_by(SessionWindowing::of(Duration::from_millis(3_500)).using(
      |(word, _): &Word| word.chars().next(),
      |(_, ts): &Word| *ts,
    ))
    .set_num_partitions(partitions)
    .output_windowed()
    .unwrap()
    .repartition()
    .set_num_partitions(1)
    .output()
    .unwrap()
    .persist(sink.clone())
    .unwrap();
  flow.run().await.unwrap();

  let mut spans: BTreeMap<(i64, i64), u64> = BTreeMap::new();
  for pair in sink.output(0) {
    let (Some(start), Some(end)) = (pair.window().start_millis(), pair.window().end_millis()) else {
      panic!("session without bounds: {}", pair.window());
    };
    *spans.entry((start, end)).or_default() += *pair.value();
  }
  spans
}

#[tokio::test]
async fn test_session_groups_do_not_depend_on_partitioning() {
  let expected: BTreeMap<(i64, i64), u64> = [((1_000, 7_500), 2), ((8_000, 17_500), 4)]
    .into_iter()
    .collect();
  assert_eq!(session_spans(1).await, expected);
  assert_eq!(session_spans(4).await, expected);
}

async fn attached_count_totals(partitions: usize) -> BTreeMap<Window, u64> {
  let flow = Flow::create("count-totals");
  let input = flow.create_input(ListSource::bounded(vec![vec!["a", "b", "a", "b"]]));
  let pairs = ReduceByKey::of(input)
    .key_by(|word: &&str| word.to_string())
    .value_by(|_| 1u64)
    .combine_by(sums::of_u64s())
    .window_by(CountWindowing::of(2))
    .set_num_partitions(partitions)
    .output()
    .unwrap();
  let sink = ListSink::new(1);
  ReduceByKey::of(pairs)
    .key_by(|_: &(String, u64)| "all".to_string())
    .value_by(|(_, count): &(String, u64)| *count)
    .combine_by(sums::of_u64s())
    .set_num_partitions(1)
    .output_windowed()
    .unwrap()
    .persist(sink.clone())
    .unwrap();
  flow.run().await.unwrap();

  by_window(&sink.output(0))
    .into_iter()
    .map(|(window, mut values)| (window, values.remove("all").unwrap()))
    .collect()
}

#[tokio::test]
async fn test_attached_count_windows_do_not_depend_on_partitioning() {
  let expected: BTreeMap<Window, u64> = ["a", "b"]
    .into_iter()
    .map(|word| (Window::Count(CountWindow::new(GroupTag::of(word), 0)), 2))
    .collect();
  assert_eq!(attached_count_totals(1).await, expected);
  assert_eq!(attached_count_totals(2).await, expected);
}

async fn rebuilt_count_windows(data_partitions: usize) -> Vec<BTreeSet<String>> {
  let flow = Flow::create("end-of-window");
  let words: Vec<&str> = "0-one 1-two 0-three 1-four 0-five 1-six 0-seven".split(' ').collect();
  let input = flow.create_input(
    ListSource::unbounded(vec![words]).set_sleep_time(Duration::from_millis(100)),
  );

  let first = ReduceByKey::of(input)
    .key_by(|_: &&str| "")
    .value_by(|word: &&str| word.to_string())
    .reduce_by(|words| words.into_iter().collect::<BTreeSet<String>>())
    .set_num_partitions(data_partitions)
    .window_by(CountWindowing::of(3))
    .output()
    .unwrap();
  let spread = first
    .flat_map(|(_, words)| words)
    .repartition()
    .set_num_partitions(2)
    .set_partitioner(|word: &String| usize::from(word.as_bytes()[0] - b'0'))
    .output()
    .unwrap()
    .repartition()
    .set_num_partitions(1)
    .output()
    .unwrap();

  let sink = ListSink::new(1);
  ReduceByKey::of(spread)
    .key_by(|_: &String| "")
    .value_by(|word: &String| word.clone())
    .reduce_by(|words| words.into_iter().collect::<BTreeSet<String>>())
    .output()
    .unwrap()
    .map(|(_, words)| words)
    .persist(sink.clone())
    .unwrap();
  flow.run().await.unwrap();
  sink.output(0)
}

fn set(words: &[&str]) -> BTreeSet<String> {
  words.iter().map(|word| word.to_string()).collect()
}

#[tokio::test(start_paused = true)]
async fn test_attached_windowing_rebuilds_count_windows() {
  let expected = vec![
    set(&["0-one", "1-two", "0-three"]),
    set(&["1-four", "0-five", "1-six"]),
    set(&["0-seven"]),
  ];
  assert_eq!(rebuilt_count_windows(1).await, expected);
  assert_eq!(rebuilt_count_windows(2).await, expected);
}

#[tokio::test(start_paused = true)]
async fn test_attached_windowing_emits_continuously() {
  let read_delay = Duration::from_millis(100);
  let flow = Flow::create("continuous-attached");
  let words: Vec<&str> = "r-one r-two r-three s-one s-two s-three t-one".split(' ').collect();
  let input = flow.create_input(ListSource::unbounded(vec![words]).set_sleep_time(read_delay));

  let first = ReduceByKey::of(input)
    .key_by(|_: &&str| "")
    .value_by(|word: &&str| word.to_string())
    .reduce_by(|words| words.into_iter().collect::<BTreeSet<String>>())
    .window_by(CountWindowing::of(3))
    .output()
    .unwrap();
  let mediator = first.map(|pair| pair);
  let second = ReduceByKey::of(mediator)
    .key_by(|(key, _): &(&'static str, BTreeSet<String>)| *key)
    .value_by(|(_, words): &(&'static str, BTreeSet<String>)| words.clone())
    .combinable_reduce_by(|sets| {
      let mut merged = set(&["!"]);
      for words in sets {
        merged.extend(words);
      }
      merged
    })
    .output()
    .unwrap();
  let sink = ListSink::new(1);
  second
    .map(|(_, words)| (tokio::time::Instant::now(), words))
    .persist(sink.clone())
    .unwrap();
  flow.run().await.unwrap();

  let mut output = sink.output(0);
  assert_eq!(output.len(), 3);
  output.sort_by_key(|(at, _)| *at);
  assert!(output[1].0 >= output[0].0 + read_delay - Duration::from_millis(1));
  assert!(output[2].0 >= output[1].0 + read_delay - Duration::from_millis(1));
  let sets: Vec<BTreeSet<String>> = output.into_iter().map(|(_, words)| words).collect();
  assert_eq!(
    sets,
    vec![
      set(&["!", "r-one", "r-two", "r-three"]),
      set(&["!", "s-one", "s-two", "s-three"]),
      set(&["!", "t-one"]),
    ]
  );
}
